use crate::archiver::flow::Flow;
use crate::archiver::time_range::TimeRange;
use crate::archiver::util::truncate_with_ellipsis;
use crate::error::ArchiveError;
use crate::nad::transport::{Transport, with_query};
use serde::Deserialize;
use serde_json::{Map, Value};

const QUERY_COLUMNS: [&str; 3] = ["id", "start", "end"];
const LOGGED_BODY_CHARS: usize = 2_000;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: Vec<Value>,
}

/// Runs bounded flow queries against one NAD query endpoint.
pub struct FlowQueryClient<'a> {
    transport: &'a dyn Transport,
    batch_size: usize,
}

impl<'a> FlowQueryClient<'a> {
    pub fn new(transport: &'a dyn Transport, batch_size: usize) -> Self {
        Self {
            transport,
            batch_size: batch_size.max(1),
        }
    }

    /// Fetch up to `batch_size` flows of `source_index` whose end timestamp
    /// lies inside `time_range`, narrowed by the optional filter expression.
    pub fn query_flows(
        &self,
        time_range: &TimeRange,
        source_index: &str,
        filter_expression: Option<&str>,
    ) -> Result<Vec<Flow>, ArchiveError> {
        let query = build_query(time_range, filter_expression, self.batch_size);
        let path = with_query("bql", &[("source", source_index)]);
        tracing::debug!(%query, source_index, "BQL query");

        let response = self
            .transport
            .post_json(&path, &Value::String(query))
            .map_err(|err| ArchiveError::Query {
                status: None,
                message: err.to_string(),
            })?;
        if !response.is_success() {
            tracing::error!(
                status = response.status,
                body = %truncate_with_ellipsis(&response.text, LOGGED_BODY_CHARS),
                "flow query rejected"
            );
            return Err(ArchiveError::Query {
                status: Some(response.status),
                message: response.text,
            });
        }

        let decoded: QueryResponse = response.json().map_err(|err| ArchiveError::Query {
            status: Some(response.status),
            message: format!("invalid query response: {err}"),
        })?;
        decoded.result.iter().map(decode_row).collect()
    }
}

pub fn build_query(
    time_range: &TimeRange,
    filter_expression: Option<&str>,
    limit: usize,
) -> String {
    let mut query = format!(
        "SELECT {} FROM flow WHERE (end >= {} AND end <= {})",
        QUERY_COLUMNS.join(", "),
        time_range.start(),
        time_range.end()
    );
    if let Some(filter) = filter_expression.map(str::trim).filter(|f| !f.is_empty()) {
        query.push_str(&format!(" AND ({filter})"));
    }
    query.push_str(&format!(" LIMIT {limit}"));
    query
}

fn decode_row(row: &Value) -> Result<Flow, ArchiveError> {
    match row {
        Value::Array(cells) => {
            let obj: Map<String, Value> = QUERY_COLUMNS
                .iter()
                .zip(cells.iter())
                .map(|(name, cell)| (name.to_string(), cell.clone()))
                .collect();
            Ok(Flow::from_object(&obj))
        }
        Value::Object(obj) => {
            let projected: Map<String, Value> = QUERY_COLUMNS
                .iter()
                .filter_map(|name| obj.get(*name).map(|cell| (name.to_string(), cell.clone())))
                .collect();
            Ok(Flow::from_object(&projected))
        }
        other => Err(ArchiveError::Query {
            status: None,
            message: format!("unexpected query row: {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::testing::{Call, ScriptedTransport};
    use serde_json::json;

    fn window() -> TimeRange {
        TimeRange::new(100, 200).expect("range")
    }

    #[test]
    fn query_text_conjoins_filter_and_limit() {
        assert_eq!(
            build_query(&window(), Some("proto == 'tcp'"), 50),
            "SELECT id, start, end FROM flow WHERE (end >= 100 AND end <= 200) AND (proto == 'tcp') LIMIT 50"
        );
    }

    #[test]
    fn blank_filter_is_ignored() {
        assert_eq!(
            build_query(&window(), Some("   "), 1),
            "SELECT id, start, end FROM flow WHERE (end >= 100 AND end <= 200) LIMIT 1"
        );
        assert_eq!(build_query(&window(), None, 1), build_query(&window(), Some(""), 1));
    }

    #[test]
    fn rows_decode_in_remote_order() {
        let transport = ScriptedTransport::new().reply(
            200,
            json!({"result": [["f2", 3, 4], {"id": "f1", "start": 1, "end": 2, "proto": "tcp"}]}),
        );
        let client = FlowQueryClient::new(&transport, 10);

        let flows = client
            .query_flows(&window(), "2", Some("src.ip == 10.0.0.1"))
            .expect("query");
        let ids: Vec<_> = flows.iter().filter_map(Flow::id).collect();
        assert_eq!(ids, vec!["f2", "f1"]);
        assert_eq!(flows[0].end().as_deref(), Some("4"));
        assert_eq!(flows[1].start().as_deref(), Some("1"));
        assert!(!flows[1].is_set("proto"));

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let Call::Post(path, body) = &calls[0] else {
            panic!("expected POST, got {calls:?}");
        };
        assert_eq!(path, "bql?source=2");
        assert!(body.as_str().expect("query string").contains("AND (src.ip == 10.0.0.1)"));
    }

    #[test]
    fn source_index_is_encoded_into_the_query_string() {
        let transport = ScriptedTransport::new().reply(200, json!({"result": []}));
        FlowQueryClient::new(&transport, 10)
            .query_flows(&window(), "2&source=9", None)
            .expect("query");
        let Call::Post(path, _) = &transport.calls()[0] else {
            panic!("expected POST");
        };
        assert_eq!(path, "bql?source=2%26source%3D9");
    }

    #[test]
    fn short_rows_leave_fields_unset() {
        let transport = ScriptedTransport::new().reply(200, json!({"result": [["f1"]]}));
        let flows = FlowQueryClient::new(&transport, 10)
            .query_flows(&window(), "2", None)
            .expect("query");
        assert_eq!(flows[0].id().as_deref(), Some("f1"));
        assert!(!flows[0].is_set("end"));
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let transport = ScriptedTransport::new().reply(200, json!({"result": []}));
        let flows = FlowQueryClient::new(&transport, 10)
            .query_flows(&window(), "2", None)
            .expect("query");
        assert!(flows.is_empty());
    }

    #[test]
    fn success_body_without_result_is_an_error() {
        let transport =
            ScriptedTransport::new().reply(200, json!({"error": "index 2 unavailable"}));
        let err = FlowQueryClient::new(&transport, 10)
            .query_flows(&window(), "2", None)
            .expect_err("missing result must not read as an empty window");
        match err {
            ArchiveError::Query { status, message } => {
                assert_eq!(status, Some(200));
                assert!(message.contains("missing field `result`"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn remote_failure_surfaces_status_and_message() {
        let transport = ScriptedTransport::new().reply_text(400, "syntax error near 'FROM'");
        let err = FlowQueryClient::new(&transport, 10)
            .query_flows(&window(), "2", Some("bogus"))
            .expect_err("should fail");
        match err {
            ArchiveError::Query { status, message } => {
                assert_eq!(status, Some(400));
                assert!(message.contains("syntax error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn connection_failure_is_a_query_error() {
        let transport = ScriptedTransport::new().fail("connection refused");
        let err = FlowQueryClient::new(&transport, 10)
            .query_flows(&window(), "2", None)
            .expect_err("should fail");
        assert!(matches!(err, ArchiveError::Query { status: None, .. }));
    }

    #[test]
    fn batch_size_of_zero_is_clamped() {
        let transport = ScriptedTransport::new().reply(200, json!({"result": []}));
        FlowQueryClient::new(&transport, 0)
            .query_flows(&window(), "2", None)
            .expect("query");
        let Call::Post(_, body) = &transport.calls()[0] else {
            panic!("expected POST");
        };
        assert!(body.as_str().expect("query").ends_with("LIMIT 1"));
    }
}
