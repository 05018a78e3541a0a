// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

use super::{print_json, Context};
use crate::error::Result;

#[derive(Debug, Serialize)]
struct PingResult {
    endpoint: String,
    rtt_ms: f64,
}

/// Round-trip a ping to the service.
pub async fn run(ctx: &Context) -> Result<()> {
    let transport = ctx.one_shot_transport();
    ctx.connect(&transport).await?;
    let rtt = transport.ping().await;
    transport.disconnect().await?;

    let result = PingResult {
        endpoint: ctx.transport.endpoint.to_string(),
        rtt_ms: rtt?.as_secs_f64() * 1000.0,
    };
    if ctx.is_json() {
        print_json(&result)
    } else {
        println!("pong from {} in {:.1} ms", result.endpoint, result.rtt_ms);
        Ok(())
    }
}
