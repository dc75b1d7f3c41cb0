use std::ops::{Deref, DerefMut};

/// Signed wheel speeds in wheel degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WheelSpeeds {
    pub left: i32,
    pub right: i32,
}

impl WheelSpeeds {
    pub const STOP: Self = Self { left: 0, right: 0 };

    /// Round and clamp raw controller outputs to `±limit`.
    pub fn clamped(left: f32, right: f32, limit: f32) -> Self {
        let bound = |v: f32| {
            if v.is_nan() {
                0
            } else {
                v.clamp(-limit, limit).round() as i32
            }
        };
        Self {
            left: bound(left),
            right: bound(right),
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self == Self::STOP
    }
}

impl std::fmt::Display for WheelSpeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L {:+} R {:+}", self.left, self.right)
    }
}

/// Where wheel commands go. Best effort: implementations log their own failures.
pub trait ActuationSink {
    fn drive(&mut self, speeds: WheelSpeeds);
    fn brake(&mut self);
}

impl<A: ActuationSink + ?Sized> ActuationSink for &mut A {
    fn drive(&mut self, speeds: WheelSpeeds) {
        (**self).drive(speeds);
    }

    fn brake(&mut self) {
        (**self).brake();
    }
}

/// Owns a sink and brakes it when dropped, whatever the exit path.
pub struct BrakeGuard<A: ActuationSink> {
    sink: A,
}

impl<A: ActuationSink> BrakeGuard<A> {
    pub fn new(sink: A) -> Self {
        Self { sink }
    }
}

impl<A: ActuationSink> Deref for BrakeGuard<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.sink
    }
}

impl<A: ActuationSink> DerefMut for BrakeGuard<A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut self.sink
    }
}

impl<A: ActuationSink> Drop for BrakeGuard<A> {
    fn drop(&mut self) {
        self.sink.brake();
    }
}
