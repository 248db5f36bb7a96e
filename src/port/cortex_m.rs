//! Cortex-M CPU port
//!
//! Interrupt masking through PRIMASK, interrupt detection through IPSR and
//! a PendSV request for the deferred context switch. A kernel binding for a
//! Cortex-M target implements the CPU half of [`Kernel`](super::Kernel) with
//! these functions.

use cortex_m::interrupt;
use cortex_m::register::primask;

use crate::types::IrqState;

#[cfg(not(feature = "std"))]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

/// Mask interrupts and report whether they were enabled
#[inline(always)]
pub fn irq_save() -> IrqState {
    let was_active = primask::read().is_active();
    interrupt::disable();
    IrqState::from_enabled(was_active)
}

/// Unmask interrupts if `state` says they were enabled
#[inline(always)]
pub fn irq_restore(state: IrqState) {
    if state.was_enabled() {
        unsafe { interrupt::enable() }
    }
}

/// Check if currently executing in an exception handler
#[inline]
pub fn in_isr() -> bool {
    let ipsr: u32;
    unsafe {
        core::arch::asm!(
            "mrs {}, IPSR",
            out(reg) ipsr,
            options(nomem, nostack, preserves_flags)
        );
    }
    ipsr != 0
}

/// Pend a context switch that runs once the current interrupt returns
#[inline(always)]
pub fn yield_from_isr() {
    cortex_m::peripheral::SCB::set_pendsv();
}
