//! Unit tests for core ESPOS modules
//!
//! These tests need no kernel: errors, option types, configuration and
//! tick conversion.

#[cfg(test)]
mod error_tests {
    use espos::error::{status_code, EsposError, EsposResult};

    #[test]
    fn test_error_codes() {
        assert_eq!(EsposError::InvalidArgument.code(), -22);
        assert_eq!(EsposError::OutOfMemory.code(), -12);
        assert_eq!(EsposError::Timeout.code(), -116);
        assert_eq!(EsposError::CalledFromIsr.code(), -4);
        assert_eq!(EsposError::PermissionDenied.code(), -1);
        assert_eq!(EsposError::ResourceBusy.code(), -11);
        assert_eq!(EsposError::Canceled.code(), -140);
        assert_eq!(EsposError::NotSupported.code(), -134);
    }

    #[test]
    fn test_from_code() {
        for e in [
            EsposError::InvalidArgument,
            EsposError::OutOfMemory,
            EsposError::Timeout,
            EsposError::CalledFromIsr,
            EsposError::PermissionDenied,
            EsposError::ResourceBusy,
            EsposError::Canceled,
            EsposError::NotSupported,
        ] {
            assert_eq!(EsposError::from_code(e.code()), Some(e));
        }
        assert_eq!(EsposError::from_code(0), None);
        assert_eq!(EsposError::from_code(-9999), None);
    }

    #[test]
    fn test_status_code() {
        let ok: EsposResult<u32> = Ok(3);
        let err: EsposResult<u32> = Err(EsposError::Timeout);
        assert_eq!(status_code(&ok), 0);
        assert_eq!(status_code(&err), -116);
    }

    #[test]
    fn test_error_display() {
        let msg = format!("{}", EsposError::CalledFromIsr);
        assert!(msg.contains("interrupt"));
        assert_eq!(format!("{:?}", EsposError::Timeout), "Timeout");
    }
}

#[cfg(test)]
mod types_tests {
    use espos::error::EsposError;
    use espos::types::*;

    #[test]
    fn test_mutex_type_from_raw() {
        assert_eq!(MutexType::from_raw(0), Ok(MutexType::Normal));
        assert_eq!(MutexType::from_raw(1), Ok(MutexType::Recursive));
        assert_eq!(MutexType::from_raw(2), Err(EsposError::InvalidArgument));
    }

    #[test]
    fn test_queue_options_from_raw() {
        assert_eq!(QueuePos::from_raw(0), Ok(QueuePos::Front));
        assert_eq!(QueuePos::from_raw(1), Ok(QueuePos::Back));
        assert!(QueuePos::from_raw(7).is_err());

        assert_eq!(SendMode::from_raw(1), Ok(SendMode::Overwrite));
        assert!(SendMode::from_raw(2).is_err());

        assert_eq!(RecvMode::from_raw(1), Ok(RecvMode::Peek));
        assert!(RecvMode::from_raw(2).is_err());
    }

    #[test]
    fn test_timer_options() {
        assert_eq!(TimerOpt::AUTO_RUN, TimerOpt::AUTO_RELOAD | TimerOpt::AUTO_START);
        assert!(TimerOpt::NO_AUTO_RUN.is_empty());
        assert_eq!(TimerOpt::from_raw(3), Ok(TimerOpt::AUTO_RUN));
        assert_eq!(TimerOpt::from_raw(0), Ok(TimerOpt::NO_AUTO_RUN));
        assert_eq!(TimerOpt::from_raw(4), Err(EsposError::InvalidArgument));
    }

    #[test]
    fn test_timer_change_from_raw() {
        assert_eq!(TimerChange::from_raw(0), Ok(TimerChange::Period));
        assert_eq!(TimerChange::from_raw(1), Ok(TimerChange::OneShot));
        assert_eq!(TimerChange::from_raw(2), Ok(TimerChange::AutoReload));
        assert!(TimerChange::from_raw(3).is_err());
    }

    #[test]
    fn test_irq_state() {
        assert!(IrqState::ENABLED.was_enabled());
        assert!(!IrqState::MASKED.was_enabled());
        assert_eq!(IrqState::from_enabled(true), IrqState::ENABLED);
    }

    #[test]
    fn test_obj_none_is_never_a_handle() {
        assert_eq!(OBJ_NONE, 0);
        assert!(espos::TaskHandle::from_raw(OBJ_NONE).is_none());
        assert!(espos::QueueHandle::from_raw(OBJ_NONE).is_none());
        // index without a generation
        assert!(espos::SemHandle::from_raw(5).is_none());
    }
}

#[cfg(test)]
mod config_tests {
    use espos::config::*;

    #[test]
    fn test_config_values() {
        assert!(CFG_PROCESSORS_NUM >= 1);
        assert!(CFG_MAX_PRIORITIES > 1);
        assert_eq!(CFG_TICK_RATE_HZ, 100);
        assert_eq!(CFG_NO_DELAY, 0);
        assert_eq!(CFG_MAX_DELAY, u32::MAX);
        assert!(CFG_TASK_NAME_LEN > 1);
    }
}

#[cfg(test)]
mod time_tests {
    use espos::time::{ms_to_ticks, ticks_to_ms};

    #[test]
    fn test_ms_to_ticks_rounds_up() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), 1);
        assert_eq!(ms_to_ticks(10), 1);
        assert_eq!(ms_to_ticks(11), 2);
        assert_eq!(ms_to_ticks(1000), 100);
    }

    #[test]
    fn test_ms_to_ticks_large_values() {
        assert_eq!(ms_to_ticks(u32::MAX), 429_496_730);
        assert!(ms_to_ticks(u32::MAX) < u32::MAX);
    }

    #[test]
    fn test_ticks_to_ms() {
        assert_eq!(ticks_to_ms(0), 0);
        assert_eq!(ticks_to_ms(1), 10);
        assert_eq!(ticks_to_ms(100), 1000);
        assert_eq!(ticks_to_ms(u32::MAX), u32::MAX);
    }
}
