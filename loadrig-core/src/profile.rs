//! Test profile domain model
//!
//! A [`TestProfile`] is the validated, strongly typed description of one
//! load test. Profiles usually arrive as a loose [`ProfileForm`] (the flat
//! shape used by the UI and by profile files) and are converted with
//! [`TestProfile::try_from_form`], which selects exactly one [`LoadShape`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Identifier of a profile in the profile store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        ProfileId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        ProfileId(id.to_string())
    }
}

impl From<String> for ProfileId {
    fn from(id: String) -> Self {
        ProfileId(id)
    }
}

/// HTTP methods a profile may target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Name of the `k6/http` function issuing this method
    pub fn k6_function(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "del",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }

    /// Whether a request body is sent for this method
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(CoreError::InvalidMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

/// One ramp step: reach `target` over `duration`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub duration: String,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: impl Into<String>, target: u32) -> Self {
        Self {
            duration: duration.into(),
            target,
        }
    }
}

/// Pass/fail condition on an aggregate runner metric, e.g. `http_req_duration` / `p(95)<500`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric: String,
    pub condition: String,
}

impl Threshold {
    pub fn new(metric: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            condition: condition.into(),
        }
    }
}

/// Whether the test drives concurrency or throughput
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadCategory {
    /// Fixed or ramped number of virtual users
    #[default]
    Vus,
    /// Fixed or ramped request arrival rate
    Rps,
}

impl LoadCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadCategory::Vus => "vus",
            LoadCategory::Rps => "rps",
        }
    }
}

impl fmt::Display for LoadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSubMode {
    #[default]
    Simple,
    Stages,
}

impl LoadSubMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadSubMode::Simple => "simple",
            LoadSubMode::Stages => "stages",
        }
    }
}

impl fmt::Display for LoadSubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single active load-shape combination of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "executor", rename_all = "kebab-case")]
pub enum LoadShape {
    ConstantVus {
        vus: u32,
        duration: String,
    },
    RampingVus {
        stages: Vec<Stage>,
    },
    ConstantArrivalRate {
        rate: u32,
        duration: String,
        pre_allocated_vus: u32,
        max_vus: u32,
    },
    RampingArrivalRate {
        stages: Vec<Stage>,
        pre_allocated_vus: u32,
        max_vus: u32,
    },
}

impl LoadShape {
    pub fn category(&self) -> LoadCategory {
        match self {
            LoadShape::ConstantVus { .. } | LoadShape::RampingVus { .. } => LoadCategory::Vus,
            LoadShape::ConstantArrivalRate { .. } | LoadShape::RampingArrivalRate { .. } => {
                LoadCategory::Rps
            }
        }
    }

    pub fn sub_mode(&self) -> LoadSubMode {
        match self {
            LoadShape::ConstantVus { .. } | LoadShape::ConstantArrivalRate { .. } => {
                LoadSubMode::Simple
            }
            LoadShape::RampingVus { .. } | LoadShape::RampingArrivalRate { .. } => {
                LoadSubMode::Stages
            }
        }
    }

    /// Ramp stages, empty for the simple shapes
    pub fn stages(&self) -> &[Stage] {
        match self {
            LoadShape::RampingVus { stages } | LoadShape::RampingArrivalRate { stages, .. } => {
                stages
            }
            _ => &[],
        }
    }

    /// Human readable label such as `vus/simple`
    pub fn label(&self) -> String {
        format!("{}/{}", self.category(), self.sub_mode())
    }
}

/// A validated load-test profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestProfile {
    pub id: ProfileId,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    pub load: LoadShape,
    #[serde(default)]
    pub thresholds: Vec<Threshold>,
    #[serde(default)]
    pub stop_on_failure: bool,
    #[serde(default)]
    pub data_file: Option<PathBuf>,
}

impl TestProfile {
    /// Create a GET profile with no headers, body or thresholds
    pub fn new(
        id: impl Into<ProfileId>,
        name: impl Into<String>,
        url: impl Into<String>,
        load: LoadShape,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            load,
            thresholds: Vec::new(),
            stop_on_failure: false,
            data_file: None,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }

    /// Build a profile from its flat form representation
    ///
    /// The `(loadCategory, loadSubMode)` pair selects which form fields are
    /// read; the others are ignored. A staged mode without any stage list
    /// is rejected, while an explicitly empty list is kept so the compiler
    /// can report it.
    pub fn try_from_form(id: ProfileId, form: ProfileForm) -> CoreResult<Self> {
        let mode = format!("{}/{}", form.load_category, form.load_sub_mode);
        let load = match (form.load_category, form.load_sub_mode) {
            (LoadCategory::Vus, LoadSubMode::Simple) => LoadShape::ConstantVus {
                vus: form.vus,
                duration: form.duration,
            },
            (LoadCategory::Vus, LoadSubMode::Stages) => LoadShape::RampingVus {
                stages: form.stages.ok_or(CoreError::MissingField {
                    field: "stages",
                    mode,
                })?,
            },
            (LoadCategory::Rps, LoadSubMode::Simple) => LoadShape::ConstantArrivalRate {
                rate: form.rps,
                duration: form.duration,
                pre_allocated_vus: form.pre_allocated_vus,
                max_vus: form.max_vus,
            },
            (LoadCategory::Rps, LoadSubMode::Stages) => LoadShape::RampingArrivalRate {
                stages: form.rps_stages.ok_or(CoreError::MissingField {
                    field: "rpsStages",
                    mode,
                })?,
                pre_allocated_vus: form.pre_allocated_vus,
                max_vus: form.max_vus,
            },
        };

        let method = match form.method.as_deref() {
            Some(m) if !m.trim().is_empty() => m.parse()?,
            _ => HttpMethod::Get,
        };

        let headers = form.headers.map(HeaderInput::into_map).unwrap_or_default();

        Ok(Self {
            id,
            name: form.name,
            url: form.url.trim().to_string(),
            method,
            headers,
            body: form.body.filter(|b| !b.is_empty()),
            load,
            thresholds: form.thresholds,
            stop_on_failure: form.stop_on_failure,
            data_file: form
                .data_file
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

/// A single `{key, value}` header row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderItem {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Headers as either a list of rows or a plain mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderInput {
    List(Vec<HeaderItem>),
    Map(BTreeMap<String, String>),
}

impl HeaderInput {
    /// Collapse into a key-unique map, dropping rows with empty keys
    ///
    /// Later rows win on duplicate keys.
    pub fn into_map(self) -> BTreeMap<String, String> {
        let pairs: Vec<(String, String)> = match self {
            HeaderInput::List(items) => items.into_iter().map(|h| (h.key, h.value)).collect(),
            HeaderInput::Map(map) => map.into_iter().collect(),
        };
        pairs
            .into_iter()
            .filter_map(|(k, v)| {
                let key = k.trim().to_string();
                (!key.is_empty()).then_some((key, v))
            })
            .collect()
    }
}

/// Flat profile representation used by forms and profile files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileForm {
    pub name: String,
    pub url: String,
    pub method: Option<String>,
    pub headers: Option<HeaderInput>,
    pub body: Option<String>,
    pub load_category: LoadCategory,
    pub load_sub_mode: LoadSubMode,
    pub vus: u32,
    pub duration: String,
    pub stages: Option<Vec<Stage>>,
    pub rps: u32,
    #[serde(rename = "preAllocatedVUs")]
    pub pre_allocated_vus: u32,
    #[serde(rename = "maxVUs")]
    pub max_vus: u32,
    pub rps_stages: Option<Vec<Stage>>,
    pub thresholds: Vec<Threshold>,
    pub stop_on_failure: bool,
    pub data_file: Option<String>,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            name: "Quick Test".to_string(),
            url: String::new(),
            method: None,
            headers: None,
            body: None,
            load_category: LoadCategory::Vus,
            load_sub_mode: LoadSubMode::Simple,
            vus: 1,
            duration: "30s".to_string(),
            stages: None,
            rps: 100,
            pre_allocated_vus: 10,
            max_vus: 100,
            rps_stages: None,
            thresholds: Vec::new(),
            stop_on_failure: false,
            data_file: None,
        }
    }
}
