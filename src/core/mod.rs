// ─── modpublisher Core ───
// Publishes one Minecraft mod release to several platforms at once.
//
// Architecture:
//   core/
//     manifest/    — Release manifest model, loader and validation
//     dependency/  — Per-platform dependency consistency checks
//     checks/      — Local artifact checks (empty jars, digests)
//     platforms/   — CurseForge, Modrinth and GitHub adapters
//     coordinator/ — Publish state machine + consolidated report
//     credentials  — Per-platform tokens from the environment
//     settings     — Retry, timeout and endpoint tunables
//     http         — Shared client + retry with backoff

pub mod checks;
pub mod coordinator;
pub mod credentials;
pub mod dependency;
pub mod error;
pub mod http;
pub mod manifest;
pub mod platforms;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_server;
