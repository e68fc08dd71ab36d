use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub url: Option<String>,
    pub referrer: Option<String>,
    pub service: Option<String>,
    pub log_context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLogRequest {
    pub level: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
    pub timestamp: Option<String>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Serialize)]
pub struct ClientLogResponse {
    pub received: bool,
}

impl ClientInfo {
    /// 缺失字段填默认值，与 context 合并后写入服务端日志
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        let or_unknown =
            |v: Option<String>| Value::String(present(v).unwrap_or_else(|| "unknown".into()));
        fields.insert("userAgent".into(), or_unknown(self.user_agent));
        fields.insert("url".into(), or_unknown(self.url));
        fields.insert(
            "referrer".into(),
            Value::String(self.referrer.unwrap_or_default()),
        );
        fields.insert("service".into(), or_unknown(self.service));
        fields.insert(
            "logContext".into(),
            Value::String(present(self.log_context).unwrap_or_else(|| "client".into())),
        );
        fields
    }
}
