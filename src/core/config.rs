// 配置读取与覆盖合并：基础 YAML + 覆盖 YAML + 环境变量占位符。
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "DOC2MD_CONFIG_PATH";
pub const CONFIG_OVERRIDE_PATH_ENV: &str = "DOC2MD_CONFIG_OVERRIDE_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/doc2md.yaml";
const DEFAULT_OVERRIDE_PATH: &str = "data/config/doc2md.override.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub static_dir: Option<String>,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_u16_from_any")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    pub allow_origins: Option<Vec<String>>,
    pub allow_methods: Option<Vec<String>>,
    pub allow_headers: Option<Vec<String>>,
    pub allow_credentials: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: usize,
    /// 临时目录根路径，为空时使用系统临时目录。
    pub scratch_root: Option<String>,
    /// 单次转换的最长耗时（秒），0 表示不限制。
    pub convert_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 16 * 1024 * 1024,
            scratch_root: None,
            convert_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub field_width: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { field_width: 15 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoringConfig {
    #[serde(default)]
    pub quality: QualityRules,
    #[serde(default)]
    pub training: TrainingRules,
}

/// 结构质量评分的扣分/加分参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRules {
    pub missing_headers_penalty: i32,
    pub poor_table_penalty: i32,
    pub pdf_bias: i32,
    pub docx_bias: i32,
    pub short_pdf_chars: usize,
    pub short_pdf_penalty: i32,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            missing_headers_penalty: 10,
            poor_table_penalty: 20,
            pdf_bias: 20,
            docx_bias: 10,
            short_pdf_chars: 500,
            short_pdf_penalty: 15,
        }
    }
}

/// 训练适用性评分的参数，基准分为 `base_score`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingRules {
    pub base_score: i32,
    pub heading_delta: i32,
    pub short_words: usize,
    pub medium_words: usize,
    pub short_penalty: i32,
    pub medium_penalty: i32,
    pub long_bonus: i32,
    pub examples_bonus: i32,
    pub examples_penalty: i32,
    pub technical_min_hits: usize,
    pub technical_bonus: i32,
    pub technical_penalty: i32,
    pub structured_bonus: i32,
    pub numeric_table_bonus: i32,
    pub unstructured_penalty: i32,
    pub list_bonus: i32,
    pub explanatory_delta: i32,
}

impl Default for TrainingRules {
    fn default() -> Self {
        Self {
            base_score: 50,
            heading_delta: 15,
            short_words: 100,
            medium_words: 300,
            short_penalty: 25,
            medium_penalty: 10,
            long_bonus: 15,
            examples_bonus: 10,
            examples_penalty: 5,
            technical_min_hits: 6,
            technical_bonus: 10,
            technical_penalty: 5,
            structured_bonus: 15,
            numeric_table_bonus: 5,
            unstructured_penalty: 10,
            list_bonus: 5,
            explanatory_delta: 5,
        }
    }
}

fn deserialize_u16_from_any<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    struct U16Visitor;

    impl<'de> Visitor<'de> for U16Visitor {
        type Value = u16;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a u16 number or numeric string")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u16::try_from(value).map_err(|_| E::custom("u16 out of range"))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if value < 0 {
                return Err(E::custom("u16 must be non-negative"));
            }
            self.visit_u64(value as u64)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(E::custom("u16 string is empty"));
            }
            trimmed
                .parse::<u16>()
                .map_err(|_| E::custom("invalid u16 string"))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            self.visit_str(&value)
        }
    }

    deserializer.deserialize_any(U16Visitor)
}

pub fn load_config() -> Config {
    let base_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let override_path = env::var(CONFIG_OVERRIDE_PATH_ENV)
        .unwrap_or_else(|_| DEFAULT_OVERRIDE_PATH.to_string());
    load_config_from(&base_path, Some(&override_path))
}

pub fn load_config_from(base_path: &str, override_path: Option<&str>) -> Config {
    let mut merged = read_yaml(base_path);
    if let Some(override_path) = override_path.filter(|path| Path::new(path).exists()) {
        let override_value = read_yaml(override_path);
        // 只对非空字段做递归覆盖，避免误清空已有配置。
        merge_yaml(&mut merged, override_value);
    }

    expand_yaml_env(&mut merged);

    if merged.is_null() {
        return Config::default();
    }
    serde_yaml::from_value::<Config>(merged).unwrap_or_else(|err| {
        warn!("配置解析失败，使用默认配置: {err}");
        Config::default()
    })
}

fn read_yaml(path: &str) -> Value {
    // 配置文件允许不存在，首次启动直接使用默认值。
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("读取配置失败: {path}, {err}");
            return Value::Null;
        }
    };
    serde_yaml::from_str(&content).unwrap_or_else(|err| {
        warn!("解析 YAML 失败: {path}, {err}");
        Value::Null
    })
}

fn merge_yaml(base: &mut Value, override_value: Value) {
    match (base, override_value) {
        (Value::Mapping(base_map), Value::Mapping(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, override_value) => {
            if !override_value.is_null() {
                *base_slot = override_value;
            }
        }
    }
}

fn expand_yaml_env(value: &mut Value) {
    match value {
        Value::String(text) => {
            *text = expand_env_placeholders(text);
        }
        Value::Sequence(items) => {
            for item in items {
                expand_yaml_env(item);
            }
        }
        Value::Mapping(map) => {
            for (_, value) in map.iter_mut() {
                expand_yaml_env(value);
            }
        }
        _ => {}
    }
}

fn expand_env_placeholders(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        rest = &rest[start + 2..];
        let Some(end) = rest.find('}') else {
            output.push_str("${");
            output.push_str(rest);
            return output;
        };
        let inner = &rest[..end];
        rest = &rest[end + 1..];
        let (name, default_value) = match inner.split_once(":-") {
            Some((name, default_value)) => (name.trim(), Some(default_value)),
            None => (inner.trim(), None),
        };
        if name.is_empty() {
            output.push_str("${");
            output.push_str(inner);
            output.push('}');
            continue;
        }
        let resolved = env::var(name).ok().filter(|value| !value.is_empty());
        match (resolved, default_value) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(default_value)) => output.push_str(default_value),
            (None, None) => {}
        }
    }
    output.push_str(rest);
    output
}
