//! Signature classification. Maps a normalized fault signature (plus the
//! alert message as a fallback) onto the technician skill category used by
//! runbook lookup and assignment routing.

pub const CATEGORY_STORAGE: &str = "storage";
pub const CATEGORY_NETWORK: &str = "network";
pub const CATEGORY_COMPUTE: &str = "compute";
pub const CATEGORY_SECURITY: &str = "security";
pub const CATEGORY_GENERIC: &str = "generic";

pub fn categorize(signature: &str, message: &str) -> &'static str {
    let signature = signature.to_lowercase();
    let message = message.to_lowercase();
    let matches = |needle: &str| signature.contains(needle) || message.contains(needle);

    if matches("disk") || matches("storage") || matches("volume") || matches("filesystem") {
        CATEGORY_STORAGE
    } else if matches("network")
        || matches("latency")
        || matches("packet")
        || matches("dns")
        || matches("interface")
    {
        CATEGORY_NETWORK
    } else if matches("malware")
        || matches("intrusion")
        || matches("auth")
        || matches("login")
        || matches("firewall")
    {
        CATEGORY_SECURITY
    } else if matches("cpu")
        || matches("memory")
        || matches("load")
        || matches("process")
        || matches("service")
        || matches("queue")
    {
        CATEGORY_COMPUTE
    } else {
        CATEGORY_GENERIC
    }
}
