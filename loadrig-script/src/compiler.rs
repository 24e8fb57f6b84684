//! Profile to k6 script compiler

use loadrig_core::duration::is_valid_duration;
use loadrig_core::{LoadCategory, LoadShape, LoadSubMode, ProfileId, Stage, TestProfile};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::error::{CompileError, CompileResult};
use crate::template::{escape_template_literal, MarkerTemplate, TemplateTarget};

/// Check name reported when a response fails the status check
pub const STATUS_CHECK: &str = "status is 2xx";

/// Caller-supplied inputs that are not part of the profile itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileContext {
    /// Values for `{{name}}` markers, inlined as literal text
    pub variables: BTreeMap<String, String>,
    /// Header row of the profile's data file, when known
    pub data_columns: Option<Vec<String>>,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_data_columns(mut self, columns: Vec<String>) -> Self {
        self.data_columns = Some(columns);
        self
    }
}

/// A runnable k6 script and what it was compiled from
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScript {
    profile_id: ProfileId,
    category: LoadCategory,
    sub_mode: LoadSubMode,
    options: Value,
    text: String,
}

impl CompiledScript {
    pub fn profile_id(&self) -> &ProfileId {
        &self.profile_id
    }

    pub fn category(&self) -> LoadCategory {
        self.category
    }

    pub fn sub_mode(&self) -> LoadSubMode {
        self.sub_mode
    }

    /// The exported k6 `options` object
    pub fn options(&self) -> &Value {
        &self.options
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Stateless k6 script compiler
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile a profile into a k6 script
    ///
    /// Identical inputs always yield byte-identical output.
    pub fn compile(
        &self,
        profile: &TestProfile,
        context: &CompileContext,
    ) -> CompileResult<CompiledScript> {
        if profile.url.trim().is_empty() {
            return Err(CompileError::invalid("url must not be empty"));
        }

        let mut options = Map::new();
        render_load_shape(&profile.load, &mut options)?;
        if let Some(thresholds) = render_thresholds(profile)? {
            options.insert("thresholds".to_string(), thresholds);
        }
        let options = Value::Object(options);

        let mut template = MarkerTemplate::new(&context.variables);
        if profile.data_file.is_some() {
            template = template.with_data_file(context.data_columns.as_deref());
        }

        let url = template.render(&profile.url, &TemplateTarget::Url)?;
        let mut headers = Vec::with_capacity(profile.headers.len());
        for (key, value) in &profile.headers {
            let rendered = template.render(value, &TemplateTarget::Header(key.clone()))?;
            headers.push((key.as_str(), rendered));
        }
        let body = match (&profile.body, profile.method.carries_body()) {
            (Some(body), true) => Some(template.render(body, &TemplateTarget::Body)?),
            _ => None,
        };

        let text = render_script(profile, &options, &url, &headers, body.as_deref())?;

        Ok(CompiledScript {
            profile_id: profile.id.clone(),
            category: profile.load.category(),
            sub_mode: profile.load.sub_mode(),
            options,
            text,
        })
    }
}

fn check_duration(field: &str, value: &str) -> CompileResult<()> {
    if is_valid_duration(value) {
        Ok(())
    } else {
        Err(CompileError::invalid(format!(
            "{field} '{value}' is not a valid duration"
        )))
    }
}

fn check_stages(field: &str, stages: &[Stage]) -> CompileResult<Value> {
    if stages.is_empty() {
        return Err(CompileError::invalid(format!(
            "{field} must contain at least one stage"
        )));
    }
    for stage in stages {
        check_duration(&format!("{field} duration"), &stage.duration)?;
    }
    Ok(Value::Array(
        stages
            .iter()
            .map(|s| json!({ "duration": s.duration, "target": s.target }))
            .collect(),
    ))
}

fn check_capacity(pre_allocated_vus: u32, max_vus: u32) -> CompileResult<()> {
    if max_vus == 0 {
        return Err(CompileError::invalid("maxVUs must be greater than 0"));
    }
    if pre_allocated_vus > max_vus {
        return Err(CompileError::invalid(format!(
            "preAllocatedVUs ({pre_allocated_vus}) exceeds maxVUs ({max_vus})"
        )));
    }
    Ok(())
}

fn render_load_shape(load: &LoadShape, options: &mut Map<String, Value>) -> CompileResult<()> {
    match load {
        LoadShape::ConstantVus { vus, duration } => {
            if *vus == 0 {
                return Err(CompileError::invalid("vus must be greater than 0"));
            }
            check_duration("duration", duration)?;
            options.insert("vus".into(), json!(vus));
            options.insert("duration".into(), json!(duration));
        }
        LoadShape::RampingVus { stages } => {
            options.insert("stages".into(), check_stages("stages", stages)?);
        }
        LoadShape::ConstantArrivalRate {
            rate,
            duration,
            pre_allocated_vus,
            max_vus,
        } => {
            if *rate == 0 {
                return Err(CompileError::invalid("rps must be greater than 0"));
            }
            check_duration("duration", duration)?;
            check_capacity(*pre_allocated_vus, *max_vus)?;
            options.insert(
                "scenarios".into(),
                json!({
                    "constant_rps": {
                        "executor": "constant-arrival-rate",
                        "rate": rate,
                        "timeUnit": "1s",
                        "duration": duration,
                        "preAllocatedVUs": pre_allocated_vus,
                        "maxVUs": max_vus,
                    }
                }),
            );
        }
        LoadShape::RampingArrivalRate {
            stages,
            pre_allocated_vus,
            max_vus,
        } => {
            let stages = check_stages("rpsStages", stages)?;
            check_capacity(*pre_allocated_vus, *max_vus)?;
            options.insert(
                "scenarios".into(),
                json!({
                    "ramping_rps": {
                        "executor": "ramping-arrival-rate",
                        "startRate": 0,
                        "timeUnit": "1s",
                        "preAllocatedVUs": pre_allocated_vus,
                        "maxVUs": max_vus,
                        "stages": stages,
                    }
                }),
            );
        }
    }
    Ok(())
}

/// Group threshold conditions per metric, keeping declaration order within a metric
fn render_thresholds(profile: &TestProfile) -> CompileResult<Option<Value>> {
    if profile.thresholds.is_empty() {
        return Ok(None);
    }
    let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for threshold in &profile.thresholds {
        let metric = threshold.metric.trim();
        let condition = threshold.condition.trim();
        if metric.is_empty() || condition.is_empty() {
            return Err(CompileError::invalid(
                "thresholds need both a metric and a condition",
            ));
        }
        grouped
            .entry(metric)
            .or_default()
            .push(Value::String(condition.to_string()));
    }
    Ok(Some(Value::Object(
        grouped
            .into_iter()
            .map(|(metric, conditions)| (metric.to_string(), Value::Array(conditions)))
            .collect(),
    )))
}

fn js_string(value: &str) -> CompileResult<String> {
    serde_json::to_string(value).map_err(|e| CompileError::invalid(e.to_string()))
}

fn render_script(
    profile: &TestProfile,
    options: &Value,
    url: &str,
    headers: &[(&str, String)],
    body: Option<&str>,
) -> CompileResult<String> {
    let options_text = serde_json::to_string_pretty(options)
        .map_err(|e| CompileError::invalid(e.to_string()))?;
    let uses_exec = profile.stop_on_failure || profile.data_file.is_some();

    let mut s = String::with_capacity(2048);
    s.push_str("import http from 'k6/http';\n");
    s.push_str("import { check, sleep } from 'k6';\n");
    s.push_str("import { Rate, Trend } from 'k6/metrics';\n");
    if profile.data_file.is_some() {
        s.push_str("import { SharedArray } from 'k6/data';\n");
        s.push_str("import papaparse from 'https://jslib.k6.io/papaparse/5.1.1/index.js';\n");
    }
    if uses_exec {
        s.push_str("import exec from 'k6/execution';\n");
    }

    s.push_str("\n// Custom metrics\n");
    s.push_str("const errorRate = new Rate('errors');\n");
    s.push_str("const responseTime = new Trend('response_time');\n");

    if let Some(path) = &profile.data_file {
        let path = js_string(&path.to_string_lossy())?;
        s.push_str("\n// Load CSV data\n");
        s.push_str("const data = new SharedArray('data', function () {\n");
        s.push_str(&format!(
            "  return papaparse.parse(open({path}), {{ header: true }}).data;\n"
        ));
        s.push_str("});\n");
    }

    s.push_str(&format!("\nexport const options = {options_text};\n"));

    s.push_str("\nexport default function () {\n");
    if profile.data_file.is_some() {
        s.push_str("  // Data row for this iteration (round-robin)\n");
        s.push_str("  const item = data[exec.scenario.iterationInTest % data.length];\n");
    }
    s.push_str(&format!("  const url = `{url}`;\n"));
    s.push_str("  const params = {\n    headers: {");
    if headers.is_empty() {
        s.push_str("},\n");
    } else {
        s.push('\n');
        for (key, value) in headers {
            s.push_str(&format!("      {}: `{}`,\n", js_string(key)?, value));
        }
        s.push_str("    },\n");
    }
    s.push_str("  };\n\n");

    let function = profile.method.k6_function();
    match body {
        Some(body) => {
            s.push_str(&format!("  const payload = `{body}`;\n"));
            s.push_str(&format!(
                "  const res = http.{function}(url, payload, params);\n"
            ));
        }
        None if function == "get" => s.push_str("  const res = http.get(url, params);\n"),
        None => s.push_str(&format!("  const res = http.{function}(url, null, params);\n")),
    }

    s.push_str("\n  responseTime.add(res.timings.duration);\n\n");
    s.push_str("  const checkResult = check(res, {\n");
    s.push_str(&format!(
        "    '{STATUS_CHECK}': (r) => r.status >= 200 && r.status < 300,\n"
    ));
    s.push_str("    'response time < 2000ms': (r) => r.timings.duration < 2000,\n");
    s.push_str("  });\n");
    s.push_str("  errorRate.add(!checkResult);\n\n");

    s.push_str("  if (res.status >= 400 || res.status === 0) {\n");
    s.push_str("    console.error(`[Request Error] Status: ${res.status}, URL: ${url}`);\n");
    s.push_str("    console.error(`[Request Error] Response Body: ${res.body}`);\n");
    if profile.stop_on_failure {
        s.push_str(&format!(
            "    console.error(`[STOP_ON_FAILURE] check={} status=${{res.status}}`);\n",
            escape_template_literal(STATUS_CHECK)
        ));
        s.push_str(
            "    exec.test.abort(`Aborting test due to failure (Status ${res.status})`);\n",
        );
    }
    s.push_str("  }\n\n");
    s.push_str("  sleep(1);\n");
    s.push_str("}\n\n");

    s.push_str("export function handleSummary(data) {\n");
    s.push_str("  return {\n");
    s.push_str("    'stdout': JSON.stringify(data, null, 2),\n");
    s.push_str("  };\n");
    s.push_str("}\n");

    Ok(s)
}
