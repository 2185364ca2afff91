//! Built-in demo topologies.

use crate::ScenarioError;
use gpon_types::{DeviceId, DeviceKind, Network, Position, TopologyError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A ready-made network for runs without a topology document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemoTopology {
    /// One OLT, one 1:8 splitter, three ONTs with routers, PCs and a server.
    #[default]
    Tree,
    /// A primary OLT feeding a splitter and a secondary OLT with its own
    /// splitter, two ONTs under each.
    MultiOlt,
}

impl DemoTopology {
    /// Build the network. Every ONT is registered with the primary OLT;
    /// `seed` drives the serial numbers.
    pub fn build(self, seed: u64) -> Result<Network, TopologyError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut builder = Builder::default();
        let olt = builder.device(DeviceKind::Olt, "OLT-1", 400.0, 60.0);

        match self {
            DemoTopology::Tree => {
                let splitter = builder.device(DeviceKind::Splitter, "Splitter-1", 400.0, 180.0);
                builder.link(olt, splitter)?;
                for i in 1..=3u32 {
                    let x = 150.0 + 250.0 * f64::from(i - 1);
                    let ont = builder.device(DeviceKind::Ont, &format!("ONT-{i}"), x, 300.0);
                    builder.link(splitter, ont)?;
                    builder.onts.push(ont);
                }
                let [ont_1, ont_2, ont_3] = [builder.onts[0], builder.onts[1], builder.onts[2]];

                let router_1 = builder.device(DeviceKind::Router, "Router-1", 150.0, 420.0);
                builder.link(ont_1, router_1)?;
                builder.endpoint(router_1, DeviceKind::Pc, "PC-1", 100.0, 540.0)?;
                builder.endpoint(router_1, DeviceKind::Pc, "PC-2", 200.0, 540.0)?;

                let router_2 = builder.device(DeviceKind::Router, "Router-2", 400.0, 420.0);
                builder.link(ont_2, router_2)?;
                builder.endpoint(router_2, DeviceKind::Server, "Server-1", 350.0, 540.0)?;
                builder.endpoint(router_2, DeviceKind::Pc, "PC-3", 450.0, 540.0)?;

                builder.endpoint(ont_3, DeviceKind::Pc, "PC-4", 650.0, 420.0)?;
            }
            DemoTopology::MultiOlt => {
                let splitter_1 = builder.device(DeviceKind::Splitter, "Splitter-1", 250.0, 180.0);
                let olt_2 = builder.device(DeviceKind::Olt, "OLT-2", 550.0, 180.0);
                let splitter_2 = builder.device(DeviceKind::Splitter, "Splitter-2", 550.0, 300.0);
                builder.link(olt, splitter_1)?;
                builder.link(olt, olt_2)?;
                builder.link(olt_2, splitter_2)?;

                for (i, (splitter, x)) in [
                    (splitter_1, 150.0),
                    (splitter_1, 350.0),
                    (splitter_2, 450.0),
                    (splitter_2, 650.0),
                ]
                .into_iter()
                .enumerate()
                {
                    let n = i + 1;
                    let ont = builder.device(DeviceKind::Ont, &format!("ONT-{n}"), x, 420.0);
                    builder.link(splitter, ont)?;
                    builder.onts.push(ont);
                    let kind = if n % 2 == 0 {
                        DeviceKind::Server
                    } else {
                        DeviceKind::Pc
                    };
                    let name = match kind {
                        DeviceKind::Server => format!("Server-{}", n / 2),
                        _ => format!("PC-{}", n / 2 + 1),
                    };
                    builder.endpoint(ont, kind, &name, x, 540.0)?;
                }
            }
        }

        let mut network = builder.network;
        for ont in builder.onts {
            network.register_onu(ont, olt, &mut rng)?;
        }
        network.bootstrap_known_onu_ids();
        Ok(network)
    }
}

#[derive(Default)]
struct Builder {
    network: Network,
    onts: Vec<DeviceId>,
}

impl Builder {
    fn device(&mut self, kind: DeviceKind, name: &str, x: f64, y: f64) -> DeviceId {
        let id = self.network.add_device(kind, name);
        if let Some(device) = self.network.device_mut(id) {
            device.position = Position { x, y };
        }
        id
    }

    fn link(&mut self, a: DeviceId, b: DeviceId) -> Result<(), TopologyError> {
        self.network.connect(a, b).map(|_| ())
    }

    fn endpoint(
        &mut self,
        parent: DeviceId,
        kind: DeviceKind,
        name: &str,
        x: f64,
        y: f64,
    ) -> Result<DeviceId, TopologyError> {
        let id = self.device(kind, name, x, y);
        self.link(parent, id)?;
        Ok(id)
    }
}

impl fmt::Display for DemoTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoTopology::Tree => f.write_str("tree"),
            DemoTopology::MultiOlt => f.write_str("multi-olt"),
        }
    }
}

impl FromStr for DemoTopology {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "tree" => Ok(DemoTopology::Tree),
            "multi-olt" | "multiolt" => Ok(DemoTopology::MultiOlt),
            _ => Err(ScenarioError::UnknownDemo(s.to_string())),
        }
    }
}
