use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Container size in whole pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const ZERO: Self = Self::new(0, 0);

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Floor a measured logical size to whole pixels; negative or non-finite
    /// measurements count as zero.
    pub fn from_measured(width: f32, height: f32) -> Self {
        let whole = |v: f32| if v.is_finite() && v > 0.0 { v.floor() as u32 } else { 0 };
        Self::new(whole(width), whole(height))
    }

    /// A container with a zero side has not been laid out yet
    #[inline]
    pub fn is_laid_out(self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn aspect(self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Publishes a container's measured size whenever it actually changes.
///
/// Subscribers get a `watch` receiver, so a slow subscriber only ever sees the
/// latest size. Dropping the receiver unsubscribes.
#[derive(Debug, Clone)]
pub struct GeometryObserver {
    sender: Arc<watch::Sender<SurfaceSize>>,
}

impl Default for GeometryObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryObserver {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SurfaceSize::ZERO);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Record a measurement. Returns `true` if it differed from the last one.
    pub fn observe(&self, size: SurfaceSize) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == size {
                false
            } else {
                *current = size;
                true
            }
        })
    }

    /// Last recorded size
    pub fn current(&self) -> SurfaceSize {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SurfaceSize> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurements_are_floored() {
        assert_eq!(SurfaceSize::from_measured(300.9, 200.2), SurfaceSize::new(300, 200));
        assert_eq!(SurfaceSize::from_measured(-4.0, f32::NAN), SurfaceSize::ZERO);
        assert!(!SurfaceSize::new(0, 200).is_laid_out());
        assert!(SurfaceSize::new(1, 1).is_laid_out());
    }

    #[test]
    fn test_observer_reports_only_deltas() {
        let observer = GeometryObserver::new();
        let mut rx = observer.subscribe();

        assert!(observer.observe(SurfaceSize::new(10, 20)));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SurfaceSize::new(10, 20));

        assert!(!observer.observe(SurfaceSize::new(10, 20)));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(observer.current(), SurfaceSize::new(10, 20));
    }
}
