use orion_error::prelude::*;
use vp_config::AssignerSpec;

use super::TimeWindow;
use crate::error::{CoreReason, CoreResult};

/// Maps an event timestamp to the windows it belongs to. Pure and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAssigner {
    Tumbling { size: i64, offset: i64 },
    Sliding { size: i64, slide: i64, offset: i64 },
}

impl WindowAssigner {
    pub fn tumbling(size: i64, offset: i64) -> CoreResult<Self> {
        if size <= 0 {
            return invalid(format!("tumbling size must be > 0, got {size}"));
        }
        if offset.abs() >= size {
            return invalid(format!(
                "tumbling offset must be smaller than size: |{offset}| >= {size}"
            ));
        }
        Ok(Self::Tumbling { size, offset })
    }

    pub fn sliding(size: i64, slide: i64, offset: i64) -> CoreResult<Self> {
        if size <= 0 {
            return invalid(format!("sliding size must be > 0, got {size}"));
        }
        if slide <= 0 {
            return invalid(format!("sliding slide must be > 0, got {slide}"));
        }
        if offset.abs() >= slide {
            return invalid(format!(
                "sliding offset must be smaller than slide: |{offset}| >= {slide}"
            ));
        }
        Ok(Self::Sliding {
            size,
            slide,
            offset,
        })
    }

    /// Build from a resolved configuration entry.
    pub fn from_spec(spec: &AssignerSpec) -> CoreResult<Self> {
        match *spec {
            AssignerSpec::Tumbling { size, offset } => {
                Self::tumbling(size.as_millis_i64(), offset.as_millis_i64())
            }
            AssignerSpec::Sliding {
                size,
                slide,
                offset,
            } => Self::sliding(
                size.as_millis_i64(),
                slide.as_millis_i64(),
                offset.as_millis_i64(),
            ),
        }
    }

    pub fn size(&self) -> i64 {
        match self {
            Self::Tumbling { size, .. } | Self::Sliding { size, .. } => *size,
        }
    }

    /// All windows containing `ts`, in ascending window order.
    ///
    /// Fails when a window containing `ts` has a bound outside the `i64` range.
    pub fn assign_windows(&self, ts: i64) -> CoreResult<Vec<TimeWindow>> {
        match *self {
            Self::Tumbling { size, offset } => {
                let start = window_start(ts, offset, size)?;
                Ok(vec![window_at(i128::from(start), size, ts)?])
            }
            Self::Sliding {
                size,
                slide,
                offset,
            } => {
                let lower = i128::from(ts) - i128::from(size);
                let mut windows = Vec::with_capacity((size / slide + 1) as usize);
                let mut start = i128::from(window_start(ts, offset, slide)?);
                while start > lower {
                    windows.push(window_at(start, size, ts)?);
                    start -= i128::from(slide);
                }
                windows.reverse();
                Ok(windows)
            }
        }
    }
}

/// Start of the `step`-aligned interval (shifted by `offset`) containing `ts`.
fn window_start(ts: i64, offset: i64, step: i64) -> CoreResult<i64> {
    let rem = (i128::from(ts) - i128::from(offset)).rem_euclid(i128::from(step));
    to_bound(i128::from(ts) - rem, ts)
}

fn window_at(start: i128, size: i64, ts: i64) -> CoreResult<TimeWindow> {
    Ok(TimeWindow::new(
        to_bound(start, ts)?,
        to_bound(start + i128::from(size), ts)?,
    ))
}

fn to_bound(value: i128, ts: i64) -> CoreResult<i64> {
    i64::try_from(value).map_err(|_| {
        StructError::from(CoreReason::DataFormat)
            .with_detail(format!("timestamp {ts} has a window bound outside the i64 range"))
    })
}

fn invalid<T>(detail: String) -> CoreResult<T> {
    StructError::from(CoreReason::WindowConfig)
        .with_detail(detail)
        .err()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
