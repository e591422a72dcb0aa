//! SimGrid platform description consumed by the simulator.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;

/// Identifier of the controller host, excluded from the compute nodes.
pub const MASTER_HOST_ID: &str = "master_host";

#[derive(Debug, PartialEq, Clone)]
pub struct Host {
    pub id: String,
    /// SimGrid speed rating, e.g. `10Gf`.
    pub speed: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Topology {
    pub machine_count: u32,
    pub hosts: Vec<Host>,
    pub master: Host,
}

impl Topology {
    pub fn host_ids(&self) -> impl Iterator<Item = &str> {
        self.hosts
            .iter()
            .map(|host| host.id.as_str())
            .chain(std::iter::once(self.master.id.as_str()))
    }

    pub fn to_platform_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version='1.0'?>\n");
        xml.push_str("<!DOCTYPE platform SYSTEM \"https://simgrid.org/simgrid.dtd\">\n");
        xml.push_str("<platform version=\"4.1\">\n\n");
        // writing into a String never fails
        let _ = writeln!(
            xml,
            "<zone id=\"machines_{}\" routing=\"Full\">",
            self.machine_count
        );
        for host in self.hosts.iter().chain(std::iter::once(&self.master)) {
            let _ = writeln!(xml, "    <host id=\"{}\" speed=\"{}\"/>", host.id, host.speed);
        }
        xml.push_str("</zone>\n</platform>\n");
        xml
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_platform_xml())?;
        Ok(())
    }

    /// Conventional file name for a platform of this size.
    pub fn file_name(&self) -> String {
        format!("machines_{}.xml", self.machine_count)
    }
}
