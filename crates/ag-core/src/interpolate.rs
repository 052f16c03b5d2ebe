//! Ramp interpolation
//!
//! The curves are graph transformations of a sine quarter/half period or of
//! an n-th root, scaled to the span. Every formula is evaluated in `f64` and
//! the change is truncated toward zero before it is added to the start value,
//! so results are reproducible tick for tick.

use crate::change::ChangeMethod;
use std::f64::consts::{FRAC_PI_2, PI};

/// Value of a ramp `elapsed` ticks after its start.
///
/// `span` is the ramp length in ticks. A zero span or equal start and end
/// values return `start` without evaluating the curve.
pub fn interpolate(elapsed: i64, span: i64, start: i32, end: i32, method: ChangeMethod) -> i32 {
    if start == end || span == 0 {
        return start;
    }

    let diff = f64::from(end - start);
    let span = span as f64;
    let ct = elapsed as f64;

    let change = match method {
        ChangeMethod::Normal => diff * (ct / span),
        ChangeMethod::EaseIn => diff * (((ct - span) * (PI / (2.0 * span))).sin() + 1.0),
        ChangeMethod::EaseOut => diff * (ct * (PI / (2.0 * span))).sin(),
        ChangeMethod::EaseInOut => (diff / 2.0) * ((ct * (PI / span) - FRAC_PI_2).sin() + 1.0),
        // the n-th root of a negative base is undefined, so mirror the curve
        ChangeMethod::Exponential if diff > 0.0 => {
            (diff + 1.0).powf(1.0 / span).powf(ct) - 1.0
        }
        ChangeMethod::Exponential => -((-diff + 1.0).powf(1.0 / span).powf(ct) - 1.0),
    };

    start + change as i32
}

/// Value of a changing dynamic `elapsed` ticks after its start.
///
/// The start value is held for the first quarter of the duration, then the
/// value moves linearly to `end` over the remaining three quarters.
pub fn interpolate_dynamic(elapsed: i64, duration: i64, start: i32, end: i32) -> i32 {
    if start == end || duration <= 0 {
        return start;
    }
    if elapsed >= duration {
        return end;
    }

    let duration = duration as f64;
    let hold = duration / 4.0;
    let ct = elapsed as f64;
    if ct < hold {
        return start;
    }

    let progress = (ct - hold) / (duration - hold);
    start + (progress * f64::from(end - start)) as i32
}
