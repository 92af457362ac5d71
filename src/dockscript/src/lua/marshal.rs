//! Engine objects to script tables
//!
//! Each record below is the fixed field set a script sees for one kind of
//! engine object. Records are serialized into plain Lua tables; timestamps
//! become Unix seconds and digest prefixes are dropped from identifiers.

use std::collections::BTreeMap;

use chrono::DateTime;
use mlua::{Lua, LuaSerdeExt, SerializeOptions, Value};
use serde::Serialize;

use crate::engine::types::{
    ContainerInspect, ContainerState, ImageInspect, Labels, NetworkInspect, SecretInspect,
    ServiceInspect, VolumeInspect,
};

/// `"sha256:abcd"` -> `"abcd"`; identifiers without a prefix pass through
pub fn strip_digest_prefix(id: &str) -> &str {
    match id.split_once(':') {
        Some((_, rest)) => rest,
        None => id,
    }
}

/// RFC 3339 timestamp to Unix seconds, 0 when absent or malformed
pub fn unix_seconds(timestamp: &str) -> i64 {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.timestamp())
        .unwrap_or(0)
}

fn serialize_options() -> SerializeOptions {
    SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
}

/// Serialize a record (or a list of records) into a script value
pub fn to_lua<T: Serialize>(lua: &Lua, value: &T) -> mlua::Result<Value> {
    lua.to_value_with(value, serialize_options())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortRecord {
    pub ip: String,
    pub public: u16,
    pub private: u16,
    #[serde(rename = "type")]
    pub kind: String,
    pub string: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub names: Vec<String>,
    pub image: String,
    pub image_id: String,
    pub created: i64,
    pub size_rw: i64,
    pub size_root_fs: i64,
    pub state: String,
    pub status: String,
    pub ports: Vec<PortRecord>,
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub status: String,
    pub failing_streak: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub status: String,
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
    #[serde(rename = "OOMKilled")]
    pub oom_killed: bool,
    pub dead: bool,
    pub pid: i64,
    pub exit_code: i64,
    pub error: String,
    pub started_at: i64,
    pub finished_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDetailsRecord {
    pub id: String,
    pub name: String,
    pub created: i64,
    pub path: String,
    pub args: Vec<String>,
    pub image: String,
    pub image_id: String,
    pub state: StateRecord,
    pub restart_count: i64,
    pub driver: String,
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub parent_id: String,
    pub created: i64,
    pub size: i64,
    pub repo_tags: Vec<String>,
    pub labels: Labels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub name: String,
    pub driver: String,
    pub mount_point: String,
    pub labels: Labels,
    pub options: BTreeMap<String, String>,
    pub scope: String,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub created: i64,
    pub scope: String,
    pub driver: String,
    #[serde(rename = "enableIPv6")]
    pub enable_ipv6: bool,
    pub internal: bool,
    pub attachable: bool,
    pub options: BTreeMap<String, String>,
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: String,
    pub version: u64,
    pub created: i64,
    pub updated: i64,
    pub name: String,
    pub labels: Labels,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRecord {
    pub id: String,
    pub version: u64,
    pub created: i64,
    pub updated: i64,
    pub name: String,
    pub labels: Labels,
}

/// Short human status in the style of `docker ps`
fn container_status(state: &ContainerState) -> String {
    match state.status.as_str() {
        "running" if state.paused => "Up (Paused)".to_string(),
        "running" => "Up".to_string(),
        "paused" => "Up (Paused)".to_string(),
        "restarting" => "Restarting".to_string(),
        "exited" => format!("Exited ({})", state.exit_code),
        "created" => "Created".to_string(),
        "dead" => "Dead".to_string(),
        "removing" => "Removal In Progress".to_string(),
        other => other.to_string(),
    }
}

fn container_ports(container: &ContainerInspect) -> Vec<PortRecord> {
    let mut ports = Vec::new();
    let Some(bindings) = container.network_settings.ports.as_ref() else {
        return ports;
    };

    for (spec, bound) in bindings {
        let (private, kind) = spec.split_once('/').unwrap_or((spec.as_str(), "tcp"));
        let private: u16 = private.parse().unwrap_or(0);

        match bound.as_deref() {
            Some(bound) if !bound.is_empty() => {
                for b in bound {
                    let public: u16 = b.host_port.parse().unwrap_or(0);
                    ports.push(PortRecord {
                        ip: b.host_ip.clone(),
                        public,
                        private,
                        kind: kind.to_string(),
                        string: format!("{}:{}->{}/{}", b.host_ip, public, private, kind),
                    });
                }
            }
            _ => ports.push(PortRecord {
                ip: String::new(),
                public: 0,
                private,
                kind: kind.to_string(),
                string: format!("{}/{}", private, kind),
            }),
        }
    }

    ports
}

impl From<&ContainerInspect> for ContainerRecord {
    fn from(c: &ContainerInspect) -> Self {
        let name = c.name.trim_start_matches('/').to_string();
        Self {
            id: c.id.clone(),
            names: vec![name.clone()],
            name,
            image: c.config.image.clone(),
            image_id: strip_digest_prefix(&c.image).to_string(),
            created: unix_seconds(&c.created),
            size_rw: c.size_rw.unwrap_or(0),
            size_root_fs: c.size_root_fs.unwrap_or(0),
            state: c.state.status.clone(),
            status: container_status(&c.state),
            ports: container_ports(c),
            labels: c.config.labels.clone().unwrap_or_default(),
        }
    }
}

impl From<&ContainerState> for StateRecord {
    fn from(s: &ContainerState) -> Self {
        Self {
            status: s.status.clone(),
            running: s.running,
            paused: s.paused,
            restarting: s.restarting,
            oom_killed: s.oom_killed,
            dead: s.dead,
            pid: s.pid,
            exit_code: s.exit_code,
            error: s.error.clone(),
            started_at: unix_seconds(&s.started_at),
            finished_at: unix_seconds(&s.finished_at),
            health: s.health.as_ref().map(|h| HealthRecord {
                status: h.status.clone(),
                failing_streak: h.failing_streak,
            }),
        }
    }
}

impl From<&ContainerInspect> for ContainerDetailsRecord {
    fn from(c: &ContainerInspect) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.trim_start_matches('/').to_string(),
            created: unix_seconds(&c.created),
            path: c.path.clone(),
            args: c.args.clone().unwrap_or_default(),
            image: c.config.image.clone(),
            image_id: strip_digest_prefix(&c.image).to_string(),
            state: StateRecord::from(&c.state),
            restart_count: c.restart_count,
            driver: c.driver.clone(),
            labels: c.config.labels.clone().unwrap_or_default(),
        }
    }
}

impl ImageRecord {
    fn summary(i: &ImageInspect) -> Self {
        Self {
            id: strip_digest_prefix(&i.id).to_string(),
            parent_id: strip_digest_prefix(&i.parent).to_string(),
            created: unix_seconds(&i.created),
            size: i.size,
            repo_tags: i.repo_tags.clone().unwrap_or_default(),
            labels: i
                .config
                .as_ref()
                .and_then(|c| c.labels.clone())
                .unwrap_or_default(),
            architecture: None,
            os: None,
        }
    }

    /// Inspect view: the summary plus platform fields
    pub fn details(i: &ImageInspect) -> Self {
        Self {
            architecture: Some(i.architecture.clone()),
            os: Some(i.os.clone()),
            ..Self::summary(i)
        }
    }
}

impl From<&ImageInspect> for ImageRecord {
    fn from(i: &ImageInspect) -> Self {
        Self::summary(i)
    }
}

impl From<&VolumeInspect> for VolumeRecord {
    fn from(v: &VolumeInspect) -> Self {
        Self {
            name: v.name.clone(),
            driver: v.driver.clone(),
            mount_point: v.mountpoint.clone(),
            labels: v.labels.clone().unwrap_or_default(),
            options: v.options.clone().unwrap_or_default(),
            scope: v.scope.clone(),
            created: unix_seconds(&v.created_at),
        }
    }
}

impl From<&NetworkInspect> for NetworkRecord {
    fn from(n: &NetworkInspect) -> Self {
        Self {
            id: n.id.clone(),
            name: n.name.clone(),
            created: unix_seconds(&n.created),
            scope: n.scope.clone(),
            driver: n.driver.clone(),
            enable_ipv6: n.enable_ipv6,
            internal: n.internal,
            attachable: n.attachable,
            options: n.options.clone().unwrap_or_default(),
            labels: n.labels.clone().unwrap_or_default(),
        }
    }
}

impl From<&ServiceInspect> for ServiceRecord {
    fn from(s: &ServiceInspect) -> Self {
        Self {
            id: s.id.clone(),
            version: s.version.index,
            created: unix_seconds(&s.created_at),
            updated: unix_seconds(&s.updated_at),
            name: s.spec.name.clone(),
            labels: s.spec.labels.clone().unwrap_or_default(),
            image: s
                .spec
                .task_template
                .container_spec
                .as_ref()
                .map(|c| c.image.clone())
                .unwrap_or_default(),
        }
    }
}

impl From<&SecretInspect> for SecretRecord {
    fn from(s: &SecretInspect) -> Self {
        Self {
            id: s.id.clone(),
            version: s.version.index,
            created: unix_seconds(&s.created_at),
            updated: unix_seconds(&s.updated_at),
            name: s.spec.name.clone(),
            labels: s.spec.labels.clone().unwrap_or_default(),
        }
    }
}
