//! Options taken from the process environment.
//!
//! - `TATTLE_ACCESS_TOKEN` - sets `accessToken`
//! - `TATTLE_ENVIRONMENT` - sets `payload.environment`
//! - `TATTLE_CAPTURE` - comma-separated list of capture switches to turn on:
//!   - `uncaught` - `captureUncaught`
//!   - `rejections` - `captureUnhandledRejections`
//!   - `anonymous` - `inspectAnonymousErrors`
//!
//! The environment is read once per process.

use std::sync::OnceLock;

use serde_json::{Map, Value, json};

use super::keys;

#[derive(Debug, Default)]
struct TattleEnvOptions {
    access_token: Option<String>,
    environment: Option<String>,
    capture_uncaught: bool,
    capture_rejections: bool,
    inspect_anonymous: bool,
}

impl TattleEnvOptions {
    fn get() -> &'static Self {
        static TATTLE_ENV: OnceLock<TattleEnvOptions> = OnceLock::new();

        TATTLE_ENV.get_or_init(|| {
            let mut options = TattleEnvOptions {
                access_token: non_empty_var("TATTLE_ACCESS_TOKEN"),
                environment: non_empty_var("TATTLE_ENVIRONMENT"),
                ..Default::default()
            };

            if let Some(var) = std::env::var_os("TATTLE_CAPTURE") {
                for v in var.to_string_lossy().split(',') {
                    let v = v.trim();
                    if v.eq_ignore_ascii_case("uncaught") {
                        options.capture_uncaught = true;
                    } else if v.eq_ignore_ascii_case("rejections") {
                        options.capture_rejections = true;
                    } else if v.eq_ignore_ascii_case("anonymous") {
                        options.inspect_anonymous = true;
                    }
                }
            }

            options
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// The options set through the environment, as a map ready to be merged.
pub(crate) fn env_layer() -> Map<String, Value> {
    let env = TattleEnvOptions::get();
    let mut layer = Map::new();

    if let Some(token) = &env.access_token {
        layer.insert(keys::ACCESS_TOKEN.to_owned(), json!(token));
    }
    if let Some(environment) = &env.environment {
        layer.insert(keys::PAYLOAD.to_owned(), json!({ "environment": environment }));
    }
    if env.capture_uncaught {
        layer.insert(keys::CAPTURE_UNCAUGHT.to_owned(), json!(true));
    }
    if env.capture_rejections {
        layer.insert(keys::CAPTURE_UNHANDLED_REJECTIONS.to_owned(), json!(true));
    }
    if env.inspect_anonymous {
        layer.insert(keys::INSPECT_ANONYMOUS_ERRORS.to_owned(), json!(true));
    }

    layer
}
