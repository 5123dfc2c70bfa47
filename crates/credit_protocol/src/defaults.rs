//! Canonical default values shared by the API, the worker and the launcher.

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_OUTPUT_BUCKET: &str = "motor-decisao-output";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_DELIVERIES: u32 = 3;
pub const DEFAULT_REDELIVERY_DELAY_MS: u64 = 500;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

pub const SERVICE_BANNER: &str = "API Motor de Decisão";
pub const PROPOSAL_STORED_MESSAGE: &str = "Proposal received and stored.";
