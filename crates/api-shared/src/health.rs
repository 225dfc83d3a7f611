use crate::dtos::HealthRes;

/// Liveness answer shared by the REST server and the CLI.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Always healthy; the service holds no connections that could go stale.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "care manager is alive".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_health() {
        let res = HealthService::check_health();
        assert!(res.ok);
        assert!(!res.message.is_empty());
    }
}
