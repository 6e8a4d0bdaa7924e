use tracing::instrument;

#[instrument]
pub fn get_version_info() -> String {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let description = env!("CARGO_PKG_DESCRIPTION");

    tracing::debug!(
        package_name = name,
        package_version = version,
        "Gathering package information"
    );

    format!(
        "{name} {version} - {description}\n\
        Core: mockroot-core {core}\n\
        Correlation ID: {correlation}",
        core = mockroot_core::VERSION,
        correlation = crate::tracing::correlation_id()
    )
}
