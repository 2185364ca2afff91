//! Ready-made topologies for tests.
//!
//! Every fixture is built through the public [`Network`] API, so links use
//! the same port-selection rules as production code.

use gpon_types::{DeviceId, DeviceKind, Network};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed used for fixture registration serials.
pub const FIXTURE_SEED: u64 = 0x5eed;

/// `OLT - Splitter - ONT…`, optionally with a router and endpoints under each ONT.
#[derive(Debug, Clone)]
pub struct TreeFixture {
    pub network: Network,
    pub olt: DeviceId,
    pub splitter: DeviceId,
    pub onts: Vec<DeviceId>,
    /// One per ONT, same order (empty for the bare tree).
    pub routers: Vec<DeviceId>,
    /// Endpoints, two per router.
    pub pcs: Vec<DeviceId>,
}

impl TreeFixture {
    /// OLT - splitter - ONT-1, ONT-2. Nothing registered.
    pub fn olt_splitter_two_onts() -> Self {
        Self::with_onts(2)
    }

    /// OLT - splitter - `n` ONTs. Nothing registered.
    pub fn with_onts(n: usize) -> Self {
        let mut network = Network::new();
        let olt = network.add_device(DeviceKind::Olt, "OLT-1");
        let splitter = network.add_device(DeviceKind::Splitter, "Splitter-1");
        link(&mut network, olt, splitter);
        let onts = (1..=n)
            .map(|i| {
                let ont = network.add_device(DeviceKind::Ont, format!("ONT-{i}"));
                link(&mut network, splitter, ont);
                ont
            })
            .collect();
        Self {
            network,
            olt,
            splitter,
            onts,
            routers: Vec::new(),
            pcs: Vec::new(),
        }
    }

    /// Two ONTs, each with a router serving a PC and a server. All ONTs registered.
    pub fn full_tree() -> Self {
        let mut fixture = Self::olt_splitter_two_onts();
        for (i, ont) in fixture.onts.clone().into_iter().enumerate() {
            let router = fixture
                .network
                .add_device(DeviceKind::Router, format!("Router-{}", i + 1));
            link(&mut fixture.network, ont, router);
            fixture.routers.push(router);

            let pc = fixture
                .network
                .add_device(DeviceKind::Pc, format!("PC-{}", i + 1));
            link(&mut fixture.network, router, pc);
            let server = fixture
                .network
                .add_device(DeviceKind::Server, format!("Server-{}", i + 1));
            link(&mut fixture.network, router, server);
            fixture.pcs.push(pc);
            fixture.pcs.push(server);
        }
        fixture.register_all();
        fixture
    }

    /// Register every ONT with the OLT.
    pub fn register_all(&mut self) {
        let mut rng = ChaCha8Rng::seed_from_u64(FIXTURE_SEED);
        for &ont in &self.onts {
            if let Err(error) = self.network.register_onu(ont, self.olt, &mut rng) {
                panic!("fixture registration failed: {error}");
            }
        }
    }

    /// Endpoints attached to `router`.
    pub fn pcs_behind_router(&self, router: DeviceId) -> Vec<DeviceId> {
        self.pcs
            .iter()
            .copied()
            .filter(|pc| self.network.link_between(router, *pc).is_some())
            .collect()
    }
}

/// `Primary OLT - Secondary OLT - Splitter - ONT - PC`, registered, with
/// the secondary's allow-list seeded.
#[derive(Debug, Clone)]
pub struct TwoStageFixture {
    pub network: Network,
    pub primary: DeviceId,
    pub secondary: DeviceId,
    pub splitter: DeviceId,
    pub ont: DeviceId,
    pub pc: DeviceId,
}

impl TwoStageFixture {
    pub fn new() -> Self {
        let mut network = Network::new();
        let primary = network.add_device(DeviceKind::Olt, "OLT-1");
        let secondary = network.add_device(DeviceKind::Olt, "OLT-2");
        let splitter = network.add_device(DeviceKind::Splitter, "Splitter-1");
        let ont = network.add_device(DeviceKind::Ont, "ONT-1");
        let pc = network.add_device(DeviceKind::Pc, "PC-1");
        link(&mut network, primary, secondary);
        link(&mut network, secondary, splitter);
        link(&mut network, splitter, ont);
        link(&mut network, ont, pc);

        let mut rng = ChaCha8Rng::seed_from_u64(FIXTURE_SEED);
        if let Err(error) = network.register_onu(ont, primary, &mut rng) {
            panic!("fixture registration failed: {error}");
        }
        network.bootstrap_known_onu_ids();

        Self {
            network,
            primary,
            secondary,
            splitter,
            ont,
            pc,
        }
    }
}

impl Default for TwoStageFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn link(network: &mut Network, a: DeviceId, b: DeviceId) {
    if let Err(error) = network.connect(a, b) {
        panic!("fixture link {a} - {b} failed: {error}");
    }
}
