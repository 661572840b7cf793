use scenaria_core::value::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

/// What later steps see as `steps.<id>`.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub status: StepStatus,
    pub request: Option<Value>,
    pub response: Option<Value>,
    /// Step results of an included scenario.
    pub steps: Option<Map>,
}

impl StepRecord {
    pub fn new(status: StepStatus) -> Self {
        Self {
            status,
            request: None,
            response: None,
            steps: None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut m = Map::new();
        m.insert("status".into(), Value::from(self.status.as_str()));
        if let Some(r) = &self.request {
            m.insert("request".into(), r.clone());
        }
        if let Some(r) = &self.response {
            m.insert("response".into(), r.clone());
        }
        if let Some(s) = &self.steps {
            m.insert("steps".into(), Value::Map(s.clone()));
        }
        Value::Map(m)
    }
}
