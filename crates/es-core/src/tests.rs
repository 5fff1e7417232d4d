//! Unit tests for es-core primitives.

#[cfg(test)]
mod ids {
    use crate::{EventId, ManagerId, SimThreadId};

    #[test]
    fn ordering() {
        assert!(SimThreadId(0) < SimThreadId(1));
        assert!(EventId(100) > EventId(99));
    }

    #[test]
    fn display() {
        assert_eq!(SimThreadId(7).to_string(), "Thread#7");
        assert_eq!(EventId(3).to_string(), "Event#3");
        assert_eq!(ManagerId(1).to_string(), "Manager#1");
    }

    #[test]
    fn into_inner() {
        let raw: u64 = EventId(42).into();
        assert_eq!(raw, 42);
        assert_eq!(SimThreadId(9).get(), 9);
    }
}

#[cfg(test)]
mod state {
    use crate::ThreadState;

    #[test]
    fn default_is_starting() {
        assert_eq!(ThreadState::default(), ThreadState::Starting);
    }

    #[test]
    fn turn_ending_states() {
        assert!(ThreadState::Pending.ends_turn());
        assert!(ThreadState::Blocked.ends_turn());
        assert!(ThreadState::Terminated.ends_turn());
        assert!(!ThreadState::Running.ends_turn());
        assert!(!ThreadState::Marshalling.ends_turn());
        assert!(!ThreadState::Starting.ends_turn());
    }

    #[test]
    fn display() {
        assert_eq!(ThreadState::Marshalling.to_string(), "MARSHALLING");
        assert_eq!(ThreadState::Terminated.to_string(), "TERMINATED");
    }
}

#[cfg(test)]
mod rng {
    use crate::{MixingRngFactory, RngFactory, SimRng};

    #[test]
    fn deterministic_same_seed() {
        let mut r1 = SimRng::new(12345);
        let mut r2 = SimRng::new(12345);
        for _ in 0..100 {
            let a: u32 = r1.random();
            let b: u32 = r2.random();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn derived_children_are_reproducible() {
        let factory = MixingRngFactory::default();
        let mut p1 = SimRng::new(7);
        let mut p2 = SimRng::new(7);
        let mut c1 = factory.derive(&mut p1);
        let mut c2 = factory.derive(&mut p2);
        assert_eq!(c1.next_seed(), c2.next_seed());
    }

    #[test]
    fn consecutive_children_differ() {
        let factory = MixingRngFactory::default();
        let mut parent = SimRng::new(1);
        let mut a = factory.derive(&mut parent);
        let mut b = factory.derive(&mut parent);
        assert_ne!(a.next_seed(), b.next_seed());
    }

    #[test]
    fn salt_changes_stream() {
        let mut a = MixingRngFactory::new(0).from_seed(5);
        let mut b = MixingRngFactory::new(1).from_seed(5);
        assert_ne!(a.next_seed(), b.next_seed());
    }

    #[test]
    fn gen_range_in_bounds() {
        let mut rng = SimRng::new(0);
        for _ in 0..1000 {
            let v = rng.gen_range(3..9);
            assert!((3..9).contains(&v));
        }
    }

    #[test]
    fn gen_bool_extremes() {
        let mut rng = SimRng::new(0);
        assert!(!rng.gen_bool(0.0));
        assert!(rng.gen_bool(1.0));
    }

    #[test]
    fn choose_empty_is_none() {
        let mut rng = SimRng::new(0);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert_eq!(rng.choose(&[4]), Some(&4));
    }
}

#[cfg(test)]
mod config {
    use crate::{CoreError, ManagerConfig};

    #[test]
    fn default_validates() {
        let cfg = ManagerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.thread_name_prefix, "SimulationThread");
        assert_eq!(cfg.seed, 0);
    }

    #[test]
    fn empty_prefix_rejected() {
        let cfg = ManagerConfig { thread_name_prefix: String::new(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_stack_rejected() {
        let cfg = ManagerConfig { stack_size: Some(0), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_name_rejected() {
        let cfg = ManagerConfig { name: Some(String::new()), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_errors_are_config_errors() {
        let cfg = ManagerConfig { stack_size: Some(0), ..Default::default() };
        let CoreError::Config(msg) = cfg.validate().unwrap_err();
        assert!(msg.contains("stack_size"));
        assert_eq!(
            CoreError::Config(msg.clone()).to_string(),
            format!("configuration error: {msg}")
        );
    }
}
