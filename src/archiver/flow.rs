use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Every field a NAD flow record can carry.
pub const FLOW_FIELDS: &[&str] = &[
    "_prn.id",
    "_prn.tx_id",
    "_chld.id",
    "_chld.type",
    "proto",
    "src.ip",
    "src.port",
    "src.mac",
    "src.dns",
    "src.geo.region",
    "src.geo.city",
    "src.geo.country",
    "src.geo.asn",
    "src.geo.org",
    "src.groups",
    "src.name",
    "dst.ip",
    "dst.port",
    "dst.mac",
    "dst.dns",
    "dst.geo.region",
    "dst.geo.city",
    "dst.geo.country",
    "dst.geo.asn",
    "dst.geo.org",
    "dst.groups",
    "dst.name",
    "host.ip",
    "host.ip6",
    "host.port",
    "host.dns",
    "host.groups",
    "host.name",
    "bytes.total",
    "bytes.recv",
    "bytes.sent",
    "pkts.total",
    "pkts.recv",
    "pkts.sent",
    "state",
    "flags",
    "errors",
    "_reason",
    "_state",
    "tcp.flags",
    "tcp.flags_tc",
    "tcp.flags_ts",
    "tcp._state",
    "start",
    "end",
    "app_proto",
    "app_service",
    "pcaps",
    "tunnels.level",
    "tunnels.type",
    "tunnels.vlan_id",
    "tunnels.ip",
    "tunnels.ip6",
    "tunnels.endpoints.ip",
    "tunnels.endpoints.ip6",
    "tunnels.endpoints.port",
    "banner.client",
    "banner.server",
    "os.client",
    "os.server",
    "os_fp.client",
    "os_fp.server",
    "os_pt.client",
    "os_pt.server",
    "credentials.login",
    "credentials.password",
    "credentials.valid",
    "rpt.where",
    "rpt.id",
    "rpt.type",
    "rpt.cat",
    "rpt.color",
    "rpt.verdict",
    "rpt.rtime",
    "_ltime",
    "stag",
    "_ndx",
    "id",
    "_type",
    "_index",
    "_sort",
    "criticality",
    "false_positive",
    "has_files",
];

/// A flow record as returned by the query endpoint.
///
/// Only fields listed in [`FLOW_FIELDS`] are kept. A field the payload did not
/// carry is unset and [`Flow::get`] returns `None`; a field returned as `null`,
/// `0` or `""` is set and comes back as that value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Flow {
    fields: BTreeMap<&'static str, Value>,
}

impl Flow {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        let fields = FLOW_FIELDS
            .iter()
            .filter_map(|name| obj.get(*name).map(|value| (*name, value.clone())))
            .collect();
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn id(&self) -> Option<String> {
        self.text_field("id")
    }

    pub fn start(&self) -> Option<String> {
        self.text_field("start")
    }

    pub fn end(&self) -> Option<String> {
        self.text_field("end")
    }

    fn text_field(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
