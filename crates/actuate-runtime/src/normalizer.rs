//! Turns heterogeneous caller input into one flat binding map.
//!
//! Sources are layered lowest first: header params, query params, the DTO's
//! `params` object, then value parts of the upload. A later source overwrites
//! an earlier one under the same name.

use crate::error::{RuntimeError, RuntimeResult};
use crate::parts::{PartStream, UploadedPart};
use actuate_config::UploadSettings;
use actuate_core::{
    ActionId, AttachmentRef, Bindings, CommandQueryParams, ExecuteActionRequest, OldParam,
    SubstitutionMode, ViewMode,
};
use futures::StreamExt;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;

/// Part carrying the JSON execution descriptor
pub const EXECUTE_ACTION_DTO_PART: &str = "executeActionDTO";
/// Part mapping binding names to the part names that carry their values
pub const PARAMETER_MAP_PART: &str = "parameterMap";

/// Execution descriptor sent as the `executeActionDTO` part
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteActionDto {
    #[serde(default)]
    pub action_id: Option<ActionId>,
    #[serde(default)]
    pub view_mode: bool,
    #[serde(default)]
    pub query_params: Vec<OldParam>,
    #[serde(default)]
    pub header_params: Vec<OldParam>,
    #[serde(default)]
    pub params: IndexMap<String, JsonValue>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub substitution_mode: Option<SubstitutionMode>,
}

/// Early notice of what to resolve, sent as soon as the descriptor is decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionHint {
    pub action_id: ActionId,
    pub view_mode: ViewMode,
}

/// Bindings plus the files spooled while producing them
#[derive(Debug, Clone, Default)]
pub struct NormalizedParams {
    pub bindings: Bindings,
    pub attachments: Vec<AttachmentRef>,
}

#[derive(Debug, Default)]
struct Ingested {
    dto: Option<ExecuteActionDto>,
    parameter_map: IndexMap<String, String>,
    values: IndexMap<String, JsonValue>,
    attachments: Vec<AttachmentRef>,
}

impl Ingested {
    /// Value parts keyed by binding name; mapped parts take their mapped key.
    fn part_bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        let mapped: std::collections::HashSet<&str> =
            self.parameter_map.values().map(String::as_str).collect();
        for (part, value) in &self.values {
            if !mapped.contains(part.as_str()) {
                bindings.insert(part.clone(), value.clone());
            }
        }
        for (key, part) in &self.parameter_map {
            if let Some(value) = self.values.get(part) {
                bindings.insert(key.clone(), value.clone());
            }
        }
        bindings
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterNormalizer {
    settings: UploadSettings,
}

impl ParameterNormalizer {
    pub fn new(settings: UploadSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Merge query/header params with every part of an upload.
    ///
    /// A descriptor part is optional here; when present its params sit
    /// between the query params and the value parts.
    pub async fn normalize(
        &self,
        params: &CommandQueryParams,
        parts: PartStream,
    ) -> RuntimeResult<NormalizedParams> {
        reject_unnamed(params)?;
        let ingested = self.ingest(parts, None).await?;
        let mut bindings = params.to_bindings();
        if let Some(dto) = &ingested.dto {
            CommandQueryParams::new(dto.query_params.clone(), dto.header_params.clone())
                .merge_into(&mut bindings);
            bindings.extend(dto.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        bindings.extend(ingested.part_bindings());
        Ok(NormalizedParams { bindings, attachments: ingested.attachments })
    }

    /// Build an execution request from an upload whose descriptor names the action.
    ///
    /// `hint` fires once the descriptor part is decoded, so resolution can
    /// start while the remaining parts are still arriving.
    pub async fn normalize_upload(
        &self,
        parts: PartStream,
        hint: Option<oneshot::Sender<ResolutionHint>>,
    ) -> RuntimeResult<ExecuteActionRequest> {
        let mut ingested = self.ingest(parts, hint).await?;
        let part_bindings = ingested.part_bindings();
        let dto = ingested.dto.take().ok_or_else(|| {
            RuntimeError::malformed(format!("Missing '{EXECUTE_ACTION_DTO_PART}' part"))
        })?;
        let action_id = require_action_id(&dto)?;

        let mut bindings: Bindings = dto.params.into_iter().collect();
        bindings.extend(part_bindings);

        Ok(ExecuteActionRequest {
            action_id,
            branch_name: None,
            params: CommandQueryParams::new(dto.query_params, dto.header_params),
            bindings,
            view_mode: ViewMode::from_flag(dto.view_mode),
            substitution_mode: dto.substitution_mode.unwrap_or_default(),
            timeout: dto.timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
            attachments: ingested.attachments,
        })
    }

    async fn ingest(
        &self,
        mut parts: PartStream,
        mut hint: Option<oneshot::Sender<ResolutionHint>>,
    ) -> RuntimeResult<Ingested> {
        let mut ingested = Ingested::default();
        while let Some(part) = parts.next().await {
            let part = part?;
            if part.name.is_empty() {
                return Err(RuntimeError::malformed("Upload part without a name"));
            }
            match part.name.as_str() {
                EXECUTE_ACTION_DTO_PART => {
                    if ingested.dto.is_some() {
                        return Err(RuntimeError::malformed(format!(
                            "Duplicate '{EXECUTE_ACTION_DTO_PART}' part"
                        )));
                    }
                    let dto: ExecuteActionDto = self.read_json(part).await?;
                    let action_id = require_action_id(&dto)?;
                    if dto.query_params.iter().chain(&dto.header_params).any(OldParam::is_unnamed) {
                        return Err(unnamed_param());
                    }
                    if let Some(tx) = hint.take() {
                        // Receiver gone means nobody is waiting to resolve early.
                        let _ = tx.send(ResolutionHint {
                            action_id,
                            view_mode: ViewMode::from_flag(dto.view_mode),
                        });
                    }
                    ingested.dto = Some(dto);
                }
                PARAMETER_MAP_PART => {
                    ingested.parameter_map = self.read_json(part).await?;
                }
                _ if is_attachment(&part) => {
                    let attachment = self.spool(part).await?;
                    ingested
                        .values
                        .insert(attachment.part_name.clone(), attachment.to_binding());
                    ingested.attachments.push(attachment);
                }
                _ => {
                    let name = part.name.clone();
                    let value = self.read_value(part).await?;
                    ingested.values.insert(name, value);
                }
            }
        }
        tracing::debug!(
            values = ingested.values.len(),
            attachments = ingested.attachments.len(),
            mapped = ingested.parameter_map.len(),
            "Upload parts ingested"
        );
        Ok(ingested)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, part: UploadedPart) -> RuntimeResult<T> {
        let name = part.name.clone();
        let data = self.read_field(part).await?;
        serde_json::from_slice(&data)
            .map_err(|err| RuntimeError::malformed(format!("Part '{name}' is not valid JSON: {err}")))
    }

    /// Decode a non-file part under its declared content type
    async fn read_value(&self, part: UploadedPart) -> RuntimeResult<JsonValue> {
        let media = MediaType::parse(part.content_type.as_deref());
        let name = part.name.clone();
        if let Some(charset) = media.charset.as_deref() {
            if !matches!(charset, "utf-8" | "utf8" | "us-ascii") {
                return Err(RuntimeError::malformed(format!(
                    "Part '{name}' uses unsupported charset '{charset}'"
                )));
            }
        }
        let data = self.read_field(part).await?;
        if media.is_json() {
            return serde_json::from_slice(&data).map_err(|err| {
                RuntimeError::malformed(format!("Part '{name}' is not valid JSON: {err}"))
            });
        }
        String::from_utf8(data)
            .map(JsonValue::String)
            .map_err(|_| RuntimeError::malformed(format!("Part '{name}' is not valid UTF-8 text")))
    }

    async fn read_field(&self, mut part: UploadedPart) -> RuntimeResult<Vec<u8>> {
        let limit = self.settings.max_field_bytes;
        let mut data = Vec::new();
        while let Some(chunk) = part.chunk().await {
            let chunk = chunk?;
            if (data.len() + chunk.len()) as u64 > limit {
                return Err(RuntimeError::malformed(format!(
                    "Part '{}' exceeds the {limit} byte field limit",
                    part.name
                )));
            }
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    /// Stream a file part to a temp file without holding it in memory
    async fn spool(&self, mut part: UploadedPart) -> RuntimeResult<AttachmentRef> {
        let spool_dir = self.settings.spool_dir.clone();
        let temp = tokio::task::spawn_blocking(move || create_spool_file(spool_dir))
            .await
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))??;
        let (std_file, path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let limit = self.settings.max_attachment_bytes;
        let mut size: u64 = 0;
        while let Some(chunk) = part.chunk().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            if size > limit {
                return Err(RuntimeError::malformed(format!(
                    "Attachment '{}' exceeds the {limit} byte limit",
                    part.name
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        let filename = part.filename.clone().unwrap_or_else(|| part.name.clone());
        tracing::debug!(part = %part.name, filename = %filename, size, "Attachment spooled");
        Ok(AttachmentRef::new(part.name, filename, part.content_type, size, path))
    }
}

fn create_spool_file(dir: Option<PathBuf>) -> std::io::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("actuate-upload-");
    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

/// Query or header params must carry a name, like upload parts
pub fn reject_unnamed(params: &CommandQueryParams) -> RuntimeResult<()> {
    if params.has_unnamed() {
        return Err(unnamed_param());
    }
    Ok(())
}

fn unnamed_param() -> RuntimeError {
    RuntimeError::malformed("Query or header parameter without a name")
}

fn require_action_id(dto: &ExecuteActionDto) -> RuntimeResult<ActionId> {
    dto.action_id
        .clone()
        .filter(|id| !id.as_str().trim().is_empty())
        .ok_or_else(|| RuntimeError::malformed(format!("'{EXECUTE_ACTION_DTO_PART}' has no actionId")))
}

/// File parts, plus binary parts sent without a filename
fn is_attachment(part: &UploadedPart) -> bool {
    part.is_file()
        || MediaType::parse(part.content_type.as_deref()).essence == "application/octet-stream"
}

struct MediaType {
    essence: String,
    charset: Option<String>,
}

impl MediaType {
    fn parse(content_type: Option<&str>) -> Self {
        let Some(raw) = content_type else {
            return Self { essence: String::new(), charset: None };
        };
        let mut pieces = raw.split(';');
        let essence = pieces.next().unwrap_or_default().trim().to_ascii_lowercase();
        let charset = pieces.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
        });
        Self { essence, charset }
    }

    fn is_json(&self) -> bool {
        self.essence == "application/json" || self.essence.ends_with("+json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::part_stream;
    use bytes::Bytes;
    use futures::stream;
    use serde_json::json;

    fn dto(value: JsonValue) -> UploadedPart {
        UploadedPart::json(EXECUTE_ACTION_DTO_PART, &value)
    }

    #[tokio::test]
    async fn later_sources_override_earlier_ones() {
        let normalizer = ParameterNormalizer::default();
        let params = CommandQueryParams::new(
            vec![OldParam::new("id", "q"), OldParam::new("page", "1")],
            vec![OldParam::new("id", "h"), OldParam::new("tenant", "acme")],
        );
        let parts = part_stream(vec![
            dto(json!({"actionId": "a1", "params": {"page": 2, "limit": 10}})),
            UploadedPart::text("limit", "25"),
        ]);
        let normalized = normalizer.normalize(&params, parts).await.unwrap();
        let b = &normalized.bindings;
        assert_eq!(b["id"], "q");
        assert_eq!(b["tenant"], "acme");
        assert_eq!(b["page"], json!(2));
        assert_eq!(b["limit"], "25");
    }

    #[tokio::test]
    async fn empty_input_gives_empty_bindings() {
        let normalizer = ParameterNormalizer::default();
        let normalized =
            normalizer.normalize(&CommandQueryParams::default(), part_stream(vec![])).await.unwrap();
        assert!(normalized.bindings.is_empty());
        assert!(normalized.attachments.is_empty());
    }

    #[tokio::test]
    async fn upload_builds_request_from_descriptor() {
        let normalizer = ParameterNormalizer::default();
        let parts = part_stream(vec![
            UploadedPart::text("p0", "42"),
            dto(json!({
                "actionId": "a1",
                "viewMode": true,
                "queryParams": [{"name": "id", "value": "7"}],
                "timeoutMs": 1500,
                "substitutionMode": "lenient"
            })),
            UploadedPart::json(PARAMETER_MAP_PART, &json!({"userId": "p0"})),
            UploadedPart::json("filter", &json!({"active": true})),
        ]);
        let request = normalizer.normalize_upload(parts, None).await.unwrap();
        assert_eq!(request.action_id, ActionId::new("a1"));
        assert_eq!(request.view_mode, ViewMode::View);
        assert_eq!(request.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(request.substitution_mode, SubstitutionMode::Lenient);

        let merged = request.merged_bindings();
        assert_eq!(merged["userId"], "42");
        assert!(!merged.contains_key("p0"));
        assert_eq!(merged["filter"], json!({"active": true}));
        assert_eq!(merged["id"], "7");
    }

    #[tokio::test]
    async fn missing_descriptor_or_action_id_is_malformed() {
        let normalizer = ParameterNormalizer::default();
        let err = normalizer
            .normalize_upload(part_stream(vec![UploadedPart::text("x", "1")]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedParameter(_)));

        let err = normalizer
            .normalize_upload(part_stream(vec![dto(json!({"params": {}}))]), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("actionId"));
    }

    #[tokio::test]
    async fn unnamed_params_are_malformed() {
        let normalizer = ParameterNormalizer::default();
        let params = CommandQueryParams::new(vec![OldParam::new("", "1")], vec![]);
        let err = normalizer.normalize(&params, part_stream(vec![])).await.unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedParameter(_)));

        let parts = part_stream(vec![dto(json!({
            "actionId": "a1",
            "headerParams": [{"name": "", "value": "x"}]
        }))]);
        let err = normalizer.normalize_upload(parts, None).await.unwrap_err();
        assert!(err.to_string().contains("without a name"));
    }

    #[tokio::test]
    async fn undecodable_parts_are_malformed() {
        let normalizer = ParameterNormalizer::default();
        let bad_json = UploadedPart::from_bytes(
            "payload",
            None,
            Some("application/json".into()),
            Bytes::from_static(b"{not json"),
        );
        let err = normalizer
            .normalize(&CommandQueryParams::default(), part_stream(vec![bad_json]))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedParameter(_)));

        let bad_text =
            UploadedPart::from_bytes("note", None, None, Bytes::from_static(&[0xff, 0xfe, 0x00]));
        let err = normalizer
            .normalize(&CommandQueryParams::default(), part_stream(vec![bad_text]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("UTF-8"));

        let latin = UploadedPart::from_bytes(
            "note",
            None,
            Some("text/plain; charset=ISO-8859-1".into()),
            Bytes::from_static(b"abc"),
        );
        assert!(normalizer
            .normalize(&CommandQueryParams::default(), part_stream(vec![latin]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn files_are_spooled_and_bound_as_metadata() {
        let normalizer = ParameterNormalizer::default();
        let parts = part_stream(vec![UploadedPart::file(
            "report",
            "r.csv",
            Some("text/csv".into()),
            Bytes::from_static(b"a,b\n1,2\n"),
        )]);
        let normalized =
            normalizer.normalize(&CommandQueryParams::default(), parts).await.unwrap();
        let attachment = &normalized.attachments[0];
        assert_eq!(attachment.size, 8);
        assert_eq!(std::fs::read(attachment.path()).unwrap(), b"a,b\n1,2\n");
        assert_eq!(normalized.bindings["report"]["filename"], "r.csv");

        let path = attachment.path_buf();
        drop(normalized);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn oversized_attachment_is_rejected() {
        let normalizer = ParameterNormalizer::new(UploadSettings {
            max_attachment_bytes: 4,
            ..Default::default()
        });
        let chunks = stream::iter(vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))]);
        let part = UploadedPart::new("blob", Some("b.bin".into()), None, chunks);
        let err = normalizer
            .normalize(&CommandQueryParams::default(), part_stream(vec![part]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }

    #[tokio::test]
    async fn hint_is_sent_before_the_stream_ends() {
        let normalizer = ParameterNormalizer::default();
        let (part_tx, part_rx) = futures::channel::mpsc::unbounded();
        part_tx
            .unbounded_send(Ok(dto(json!({"actionId": "early", "viewMode": false}))))
            .unwrap();
        let (hint_tx, hint_rx) = oneshot::channel();

        let normalize = normalizer.normalize_upload(part_rx.boxed(), Some(hint_tx));
        let observe = async move {
            let hint = hint_rx.await.unwrap();
            assert_eq!(hint.action_id, ActionId::new("early"));
            part_tx.unbounded_send(Ok(UploadedPart::text("late", "1"))).unwrap();
            drop(part_tx);
        };
        let (request, ()) = tokio::join!(normalize, observe);
        assert_eq!(request.unwrap().bindings["late"], "1");
    }
}
