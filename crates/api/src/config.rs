use std::path::PathBuf;
use std::time::Duration;

use img2mesh_worker::PoolConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`; uploads can be slow).
    pub request_timeout_secs: u64,
    /// Base directory for per-job upload staging directories.
    pub upload_dir: PathBuf,
    /// Base directory for per-job artifact directories.
    pub output_dir: PathBuf,
    /// Number of concurrent conversion workers.
    pub worker_count: usize,
    /// Capacity of the conversion submission queue.
    pub job_queue_depth: usize,
    /// Hard deadline for a single conversion in seconds.
    pub job_timeout_secs: u64,
    /// Maximum accepted multipart body size in bytes.
    pub max_upload_bytes: usize,
    /// Program invoked as the conversion pipeline.
    pub engine_cmd: String,
    /// Fixed arguments passed to the pipeline before the input paths.
    pub engine_args: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `120`                      |
    /// | `UPLOAD_DIR`           | `storage/uploads`          |
    /// | `OUTPUT_DIR`           | `storage/output`           |
    /// | `WORKER_COUNT`         | `1`                        |
    /// | `JOB_QUEUE_DEPTH`      | `16`                       |
    /// | `JOB_TIMEOUT_SECS`     | `600`                      |
    /// | `MAX_UPLOAD_BYTES`     | `52428800` (50 MiB)        |
    /// | `ENGINE_CMD`           | `python3`                  |
    /// | `ENGINE_ARGS`          | `scripts/convert.py`       |
    ///
    /// `ENGINE_ARGS` is whitespace-separated.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let upload_dir =
            PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "storage/uploads".into()));

        let output_dir =
            PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "storage/output".into()));

        let worker_count: usize = std::env::var("WORKER_COUNT")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("WORKER_COUNT must be a valid usize");

        let job_queue_depth: usize = std::env::var("JOB_QUEUE_DEPTH")
            .unwrap_or_else(|_| "16".into())
            .parse()
            .expect("JOB_QUEUE_DEPTH must be a valid usize");

        let job_timeout_secs: u64 = std::env::var("JOB_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("JOB_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "52428800".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let engine_cmd = std::env::var("ENGINE_CMD").unwrap_or_else(|_| "python3".into());

        let engine_args: Vec<String> = std::env::var("ENGINE_ARGS")
            .unwrap_or_else(|_| "scripts/convert.py".into())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            upload_dir,
            output_dir,
            worker_count,
            job_queue_depth,
            job_timeout_secs,
            max_upload_bytes,
            engine_cmd,
            engine_args,
        }
    }

    /// Worker pool sizing derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.worker_count,
            queue_depth: self.job_queue_depth,
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }
}
