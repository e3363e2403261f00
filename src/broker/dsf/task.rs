//! Typed view of the task resources arriving on the DSF push channel.
//!
//! Only the parts needed to extract a site result are modelled; unknown
//! fields are ignored.

use serde::Deserialize;

const TASK_RESOURCE_TYPE: &str = "Task";
const COMPLETED_STATUS: &str = "completed";
const BUSINESS_KEY_CODE: &str = "business-key";
const MEASURE_COUNT_CODE: &str = "measure-count";

/// Result of one site for one query, extracted from a completed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsfQueryResult {
    pub query_id: String,
    pub site_id: String,
    pub measure_count: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Task {
    resource_type: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    requester: Option<Reference>,
    #[serde(default)]
    input: Vec<Parameter>,
    #[serde(default)]
    output: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    #[serde(default)]
    identifier: Option<Identifier>,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Parameter {
    #[serde(rename = "type", default)]
    kind: Option<CodeableConcept>,
    #[serde(default)]
    value_string: Option<String>,
    #[serde(default)]
    value_unsigned_int: Option<i64>,
    #[serde(default)]
    value_integer: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CodeableConcept {
    #[serde(default)]
    coding: Vec<Coding>,
}

#[derive(Debug, Deserialize)]
struct Coding {
    #[serde(default)]
    code: Option<String>,
}

impl Parameter {
    fn has_code(&self, code: &str) -> bool {
        self.kind.as_ref().is_some_and(|kind| {
            kind.coding
                .iter()
                .any(|coding| coding.code.as_deref() == Some(code))
        })
    }
}

fn find_parameter<'a>(parameters: &'a [Parameter], code: &str) -> Option<&'a Parameter> {
    parameters.iter().find(|p| p.has_code(code))
}

/// Extract a site result from a raw frame.
///
/// Returns `None` for anything that is not a completed task carrying a query
/// id, a requesting site and a non-negative measure count.
pub fn parse_task_result(frame: &str) -> Option<DsfQueryResult> {
    let task: Task = serde_json::from_str(frame).ok()?;

    if task.resource_type != TASK_RESOURCE_TYPE
        || task.status.as_deref() != Some(COMPLETED_STATUS)
    {
        return None;
    }

    let query_id = find_parameter(&task.input, BUSINESS_KEY_CODE)?
        .value_string
        .clone()
        .filter(|id| !id.is_empty())?;

    let site_id = task
        .requester?
        .identifier?
        .value
        .filter(|id| !id.is_empty())?;

    let count = find_parameter(&task.output, MEASURE_COUNT_CODE)
        .and_then(|p| p.value_unsigned_int.or(p.value_integer))?;
    let measure_count = i32::try_from(count).ok().filter(|c| *c >= 0)?;

    Some(DsfQueryResult {
        query_id,
        site_id,
        measure_count,
    })
}
