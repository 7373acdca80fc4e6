// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for error types.

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_not_cached_error() {
        let error = CacheError::NotCached {
            gvk: "x.test/v1, Kind=W".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "cache access for x.test/v1, Kind=W before calling watch, can not read objects"
        );
    }

    #[test]
    fn test_watch_start_error() {
        let error = CacheError::WatchStart {
            gvk: "apps/v1, Kind=Deployment".to_string(),
            reason: "lock poisoned".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "starting watch for apps/v1, Kind=Deployment: lock poisoned"
        );
    }

    #[test]
    fn test_sync_timeout_error() {
        let error = CacheError::SyncTimeout {
            gvk: "x.test/v1, Kind=Missing".to_string(),
            seconds: 10,
        };

        assert_eq!(
            error.to_string(),
            "informer for x.test/v1, Kind=Missing did not sync within 10s"
        );
    }

    #[test]
    fn test_cel_errors() {
        let compile = ProbeError::CelCompile {
            rule: "self.".to_string(),
            reason: "unexpected end of input".to_string(),
        };
        assert!(compile.to_string().starts_with("compiling CEL rule \"self.\""));

        let invalid = ProbeError::CelInvalidEvaluationType {
            rule: "1 + 1".to_string(),
            actual: "int".to_string(),
        };
        assert_eq!(
            invalid.to_string(),
            "CEL rule \"1 + 1\" must evaluate to bool, got int"
        );
    }

    #[test]
    fn test_spec_errors() {
        assert_eq!(
            SpecError::MaxUnavailableTooLow(0).to_string(),
            "relabel.maxUnavailable must be at least 1, got 0"
        );
        assert_eq!(
            SpecError::MissingStrategy {
                strategy: "RoundRobin".to_string(),
                field: "roundRobin",
            }
            .to_string(),
            "strategy type RoundRobin requires .spec.strategy.roundRobin to be set"
        );
        assert_eq!(
            SpecError::EmptyTargetApiField { field: "kind" }.to_string(),
            "targetAPI.kind must not be empty"
        );
    }
}
