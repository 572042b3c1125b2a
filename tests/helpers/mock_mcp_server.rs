//! Mock MCP server for harness integration tests.
//!
//! A standalone binary that reads JSON-RPC 2.0 messages from stdin and
//! answers on stdout, one object per line. Command-line flags select
//! failure scenarios:
//!
//! | Flag | Behavior |
//! |------|----------|
//! | (none) | Respond to all supported methods correctly |
//! | `--crash-after N` | Exit after reading N messages |
//! | `--invalid-json-at N` | Print a non-JSON line for message N |
//! | `--delay MS` | Sleep before each response |
//! | `--no-response` | Read input but never respond |
//! | `--exit-immediately` | Exit before reading anything |
//! | `--exit-code N` | Exit code used when exiting |
//! | `--stderr-ready` | Print a readiness banner to stderr at startup |
//! | `--log-requests` | Log each method name to stderr |
//! | `--ignore-method M` | Never answer requests for method M |
//! | `--wrong-id` | Answer non-handshake requests with a bogus id |
//!
//! Supported methods: `initialize` (protocol `2025-06-18`),
//! `tools/list` (one `echo` tool), `tools/call`, `ping`; anything else
//! gets a `-32601` error.

use std::io::{self, BufRead, Write};

/// Configuration parsed from command-line arguments.
#[derive(Debug, Default)]
struct Config {
    /// Exit after reading this many messages (0 = unlimited).
    crash_after: usize,
    /// Print invalid JSON for this message number (0 = never).
    invalid_json_at: usize,
    /// Delay in milliseconds before responding.
    delay_ms: u64,
    /// Never respond to messages.
    no_response: bool,
    /// Exit without reading any input.
    exit_immediately: bool,
    /// Exit code to use when exiting.
    exit_code: i32,
    /// Print a readiness banner to stderr at startup.
    stderr_ready: bool,
    /// Log each request method to stderr.
    log_requests: bool,
    /// Requests for this method are read but never answered.
    ignore_method: Option<String>,
    /// Respond with a mismatched id outside the handshake.
    wrong_id: bool,
}

impl Config {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut config = Config::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--crash-after" => {
                    i += 1;
                    if i < args.len() {
                        config.crash_after = args[i].parse().unwrap_or(0);
                    }
                }
                "--invalid-json-at" => {
                    i += 1;
                    if i < args.len() {
                        config.invalid_json_at = args[i].parse().unwrap_or(0);
                    }
                }
                "--delay" => {
                    i += 1;
                    if i < args.len() {
                        config.delay_ms = args[i].parse().unwrap_or(0);
                    }
                }
                "--no-response" => config.no_response = true,
                "--exit-immediately" => config.exit_immediately = true,
                "--exit-code" => {
                    i += 1;
                    if i < args.len() {
                        config.exit_code = args[i].parse().unwrap_or(1);
                    }
                }
                "--stderr-ready" => config.stderr_ready = true,
                "--log-requests" => config.log_requests = true,
                "--ignore-method" => {
                    i += 1;
                    if i < args.len() {
                        config.ignore_method = Some(args[i].clone());
                    }
                }
                "--wrong-id" => config.wrong_id = true,
                _ => {}
            }
            i += 1;
        }

        config
    }
}

/// A parsed JSON-RPC request.
#[derive(Debug)]
struct Request {
    id: Option<serde_json::Value>,
    method: String,
}

impl Request {
    fn parse(line: &str) -> Option<Self> {
        let json: serde_json::Value = serde_json::from_str(line).ok()?;
        let obj = json.as_object()?;
        let method = obj.get("method")?.as_str()?.to_string();
        let id = obj.get("id").cloned();
        Some(Request { id, method })
    }

    fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

fn success(id: &serde_json::Value, result: serde_json::Value) -> String {
    serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()
}

fn error(id: &serde_json::Value, code: i32, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
    .to_string()
}

fn handle_initialize(id: &serde_json::Value) -> String {
    success(
        id,
        serde_json::json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "mock-mcp-server", "version": "1.0.0"}
        }),
    )
}

fn handle_tools_list(id: &serde_json::Value) -> String {
    success(
        id,
        serde_json::json!({
            "tools": [
                {
                    "name": "echo",
                    "description": "Echo input back",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "text": {"type": "string", "description": "Text to echo"}
                        },
                        "required": ["text"]
                    }
                }
            ]
        }),
    )
}

fn handle_tools_call(id: &serde_json::Value) -> String {
    success(
        id,
        serde_json::json!({
            "content": [{"type": "text", "text": "Tool executed successfully"}]
        }),
    )
}

fn route(request: &Request) -> Option<String> {
    if request.is_notification() {
        return None;
    }
    let id = request.id.as_ref()?;
    let response = match request.method.as_str() {
        "initialize" => handle_initialize(id),
        "tools/list" => handle_tools_list(id),
        "tools/call" => handle_tools_call(id),
        "ping" => success(id, serde_json::json!({})),
        _ => error(id, -32601, "Method not found"),
    };
    Some(response)
}

fn main() {
    let config = Config::from_args();

    if config.exit_immediately {
        std::process::exit(config.exit_code);
    }

    if config.stderr_ready {
        eprintln!("mock-mcp-server ready on stdio");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut seen = 0usize;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        seen += 1;

        if config.crash_after > 0 && seen > config.crash_after {
            std::process::exit(config.exit_code.max(1));
        }

        if config.delay_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(config.delay_ms));
        }

        if config.no_response {
            continue;
        }

        if config.invalid_json_at > 0 && seen == config.invalid_json_at {
            writeln!(stdout, "this is not valid json!!!").ok();
            stdout.flush().ok();
            continue;
        }

        if let Some(mut request) = Request::parse(&line) {
            if config.log_requests {
                eprintln!("handling {}", request.method);
            }
            if config
                .ignore_method
                .as_deref()
                .is_some_and(|m| m == request.method)
            {
                continue;
            }
            // The handshake keeps its real id so sessions still come up.
            if config.wrong_id && request.id.is_some() && request.method != "initialize" {
                request.id = Some(serde_json::json!("bogus-id"));
            }
            if let Some(response) = route(&request) {
                writeln!(stdout, "{}", response).ok();
                stdout.flush().ok();
            }
        }
    }
}
