use crate::wire::HealthRes;

/// Simple health service shared by the REST and real-time servers.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Check health without creating an instance.
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Clinic backend is alive".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}
