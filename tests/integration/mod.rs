//! Integration tests for the patch engine and the batch commit path.
//!
//! Uses a mock reply bundle carrying all three stock patch sites.

mod batch;
mod engine;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Reply bundle as shipped, before any patch.
pub const STOCK_REPLY_BUNDLE: &str = r#"import { resolveIdentityName, resolveAgentDir } from "./agent-scope.js";
import { extractShortModelName } from "./model-selection.js";
const HEARTBEAT_TOKEN = "HEARTBEAT_OK";
function createReplyPrefixContext(params) {
	const { cfg, agentId } = params;
	const prefixContext = { identityName: resolveIdentityName(cfg, agentId) };
	const onModelSelected = (ctx) => {
		prefixContext.provider = ctx.provider;
		prefixContext.model = extractShortModelName(ctx.model);
		prefixContext.modelFull = `${ctx.provider}/${ctx.model}`;
		prefixContext.thinkingLevel = ctx.thinkLevel ?? "off";
	};
	return {
		prefixContext,
		responsePrefix: params.responsePrefix,
		responsePrefixContextProvider: () => prefixContext,
		onModelSelected
	};
}
function normalizeReplyPayload(payload, effectivePrefix) {
	let text = payload.text ?? "";
	if (effectivePrefix && text && text.trim() !== HEARTBEAT_TOKEN && !text.startsWith(effectivePrefix)) text = `${effectivePrefix} ${text}`;
	return { ...payload, text };
}
export { createReplyPrefixContext, normalizeReplyPayload };
"#;

/// A later layout where none of the anchors survive.
pub const DRIFTED_BUNDLE: &str = r#"function assembleOutbound(message, prefix) {
	if (prefix && message.body) message.body = prefix + " " + message.body;
	return message;
}
export { assembleOutbound };
"#;

/// Fake package: `<tmp>/dist` with the given bundles, plus `package.json`.
pub fn mock_package(bundles: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let dist = dir.path().join("dist");
    fs::create_dir_all(&dist).unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name": "openclaw", "version": "2026.2.9"}"#,
    )
    .unwrap();
    for (name, text) in bundles {
        fs::write(dist.join(name), text).unwrap();
    }
    (dir, dist)
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
