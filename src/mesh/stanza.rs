// file: src/mesh/stanza.rs
// version: 1.0.0
// guid: e8b8e4a7-35c0-492f-a48e-24de66ad450b

//! ifupdown stanza model shared by the renderer and the inspector

use std::fmt;

/// One `iface` block of an interfaces(5) file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    pub name: String,
    /// Emit an `auto <name>` line before the block
    pub auto: bool,
    pub family: String,
    pub method: String,
    pub options: Vec<(String, String)>,
}

impl Stanza {
    pub fn new(name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto: false,
            family: "inet".to_string(),
            method: method.into(),
            options: Vec::new(),
        }
    }

    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// First value of an option
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_bridge(&self) -> bool {
        self.get("ovs_type") == Some("OVSBridge")
            || self.get("bridge-ports").is_some()
            || self.get("bridge_ports").is_some()
    }

    /// 802.1Q tag carried by this interface, if any
    pub fn vlan_tag(&self) -> Option<u16> {
        if let Some(opts) = self.get("ovs_options") {
            if let Some(tag) = opts
                .split_whitespace()
                .find_map(|o| o.strip_prefix("tag="))
            {
                return tag.parse().ok();
            }
        }
        if let Some(tag) = self.get("vlan-id").or_else(|| self.get("vlan_id")) {
            return tag.parse().ok();
        }
        // Kernel VLAN naming: <parent>.<tag>
        self.name
            .rsplit_once('.')
            .and_then(|(parent, tag)| if parent.is_empty() { None } else { tag.parse().ok() })
    }
}

impl fmt::Display for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.auto {
            writeln!(f, "auto {}", self.name)?;
        }
        writeln!(f, "iface {} {} {}", self.name, self.family, self.method)?;
        for (key, value) in &self.options {
            writeln!(f, "\t{} {}", key, value)?;
        }
        Ok(())
    }
}

/// Parse an interfaces(5) document into stanzas.
///
/// Only `auto`/`allow-hotplug`, `iface` and indented option lines are
/// interpreted; `source` and comment lines are skipped.
pub fn parse_interfaces(content: &str) -> Vec<Stanza> {
    let mut stanzas: Vec<Stanza> = Vec::new();
    let mut auto_names: Vec<String> = Vec::new();
    let mut in_iface = false;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let indented = raw.starts_with(char::is_whitespace);
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default();

        if indented && in_iface {
            if let Some(current) = stanzas.last_mut() {
                let value = line[keyword.len()..].trim().to_string();
                current.options.push((keyword.to_string(), value));
            }
            continue;
        }

        match keyword {
            "auto" | "allow-hotplug" => {
                auto_names.extend(words.map(str::to_string));
                in_iface = false;
            }
            "iface" => {
                let name = words.next().unwrap_or_default().to_string();
                let family = words.next().unwrap_or("inet").to_string();
                let method = words.next().unwrap_or("manual").to_string();
                stanzas.push(Stanza {
                    name,
                    auto: false,
                    family,
                    method,
                    options: Vec::new(),
                });
                in_iface = true;
            }
            _ => in_iface = false,
        }
    }

    for stanza in &mut stanzas {
        stanza.auto = auto_names.iter().any(|n| n == &stanza.name);
    }
    stanzas
}
