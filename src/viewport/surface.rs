/// Rendering surface contracts
///
/// The viewport manager only talks to surfaces through these traits, so the
/// lifecycle rules can be tested without a GPU. Surfaces draw into a
/// `DisplayRegion`, the host-owned container the UI reads frames from.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ViewportError;
use crate::store::payload::{is_skin_size, SkinPayload};

use super::camera::Camera;
use super::geometry::SurfaceSize;

/// One rendered RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub size: SurfaceSize,
    pub rgba: Arc<[u8]>,
}

/// A decoded skin ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl SkinTexture {
    /// Decode a stored payload into RGBA pixels.
    ///
    /// This is CPU work; the manager runs it on the blocking pool.
    pub fn decode(payload: &SkinPayload) -> Result<Self, ViewportError> {
        let bytes = payload
            .decode()
            .map_err(|e| ViewportError::AssetLoadFailed(e.to_string()))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| ViewportError::AssetLoadFailed(e.to_string()))?
            .to_rgba8();

        let (width, height) = image.dimensions();
        if !is_skin_size(width, height) {
            return Err(ViewportError::AssetLoadFailed(format!(
                "unsupported skin size {}x{}",
                width, height
            )));
        }

        Ok(Self {
            width,
            height,
            rgba: image.into_raw(),
        })
    }

    /// 64x32 skins predate the separate left limbs and overlay layers
    pub fn is_legacy(&self) -> bool {
        self.height * 2 == self.width
    }
}

/// A live, disposable drawing surface bound to one display region.
pub trait RenderSurface: Send + 'static {
    fn size(&self) -> SurfaceSize;

    /// Replace the displayed skin (`None` shows the empty scene).
    ///
    /// On error the surface must keep whatever it showed before.
    fn load_skin(&mut self, skin: Option<&SkinTexture>) -> Result<(), ViewportError>;

    /// Draw the current scene and present it to the display region
    fn render(&mut self, camera: &Camera) -> Result<(), ViewportError>;

    /// Release every resource. Consuming `self` makes a second call impossible.
    fn dispose(self);
}

/// Creates surfaces at a given size.
pub trait SurfaceFactory: Send + 'static {
    type Surface: RenderSurface;

    fn create(
        &mut self,
        size: SurfaceSize,
        target: SurfaceTarget,
    ) -> Result<Self::Surface, ViewportError>;
}

#[derive(Debug, Default)]
struct RegionState {
    /// Generation of the surface currently allowed to present
    attached: Option<u64>,
    frame: Option<Frame>,
    /// Bumped on every present/release so readers can skip unchanged frames
    version: u64,
}

/// Host-owned container that at most one surface draws into.
#[derive(Debug, Clone, Default)]
pub struct DisplayRegion {
    state: Arc<Mutex<RegionState>>,
}

impl DisplayRegion {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegionState> {
        // The state is plain data; a panicking holder cannot leave it half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach surface `generation`. Fails if another surface is still attached.
    pub fn claim(&self, generation: u64) -> Result<(), ViewportError> {
        let mut state = self.lock();
        match state.attached {
            Some(current) => Err(ViewportError::RegionBusy(current)),
            None => {
                state.attached = Some(generation);
                Ok(())
            }
        }
    }

    /// Detach surface `generation` and clear its last frame
    pub fn release(&self, generation: u64) {
        let mut state = self.lock();
        if state.attached == Some(generation) {
            state.attached = None;
            state.frame = None;
            state.version += 1;
        }
    }

    /// Show `frame` if `generation` is the attached surface.
    /// Returns `false` (and drops the frame) for anything else.
    pub fn present(&self, generation: u64, frame: Frame) -> bool {
        let mut state = self.lock();
        if state.attached != Some(generation) {
            return false;
        }
        state.frame = Some(frame);
        state.version += 1;
        true
    }

    pub fn attached(&self) -> Option<u64> {
        self.lock().attached
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Latest frame, if any surface has presented since attaching
    pub fn frame(&self) -> Option<Frame> {
        self.lock().frame.clone()
    }
}

/// What a surface needs to present: the region plus its own generation
#[derive(Debug, Clone)]
pub struct SurfaceTarget {
    region: DisplayRegion,
    generation: u64,
}

impl SurfaceTarget {
    pub fn new(region: DisplayRegion, generation: u64) -> Self {
        Self { region, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn present(&self, frame: Frame) -> bool {
        self.region.present(self.generation, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::payload::{sample_png, sample_skin};

    fn frame(fill: u8) -> Frame {
        Frame {
            size: SurfaceSize::new(1, 1),
            rgba: vec![fill; 4].into(),
        }
    }

    #[test]
    fn test_region_accepts_one_surface_at_a_time() {
        let region = DisplayRegion::new();
        region.claim(1).unwrap();
        assert_eq!(region.claim(2), Err(ViewportError::RegionBusy(1)));

        region.release(2);
        assert_eq!(region.attached(), Some(1));
        region.release(1);
        region.claim(2).unwrap();
    }

    #[test]
    fn test_only_attached_generation_can_present() {
        let region = DisplayRegion::new();
        region.claim(3).unwrap();

        let stale = SurfaceTarget::new(region.clone(), 2);
        let live = SurfaceTarget::new(region.clone(), 3);
        assert!(!stale.present(frame(1)));
        assert_eq!(region.frame(), None);

        let before = region.version();
        assert!(live.present(frame(2)));
        assert_eq!(region.frame(), Some(frame(2)));
        assert!(region.version() > before);

        region.release(3);
        assert_eq!(region.frame(), None);
    }

    #[test]
    fn test_decode_modern_and_legacy() {
        let modern = SkinTexture::decode(&sample_skin(1)).unwrap();
        assert_eq!((modern.width, modern.height), (64, 64));
        assert_eq!(modern.rgba.len(), 64 * 64 * 4);
        assert!(!modern.is_legacy());

        let legacy_payload = SkinPayload::from_image_bytes(&sample_png(1, 32)).unwrap();
        let legacy = SkinTexture::decode(&legacy_payload).unwrap();
        assert!(legacy.is_legacy());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let payload = SkinPayload::from_stored(b"data:image/png;base64,AAAA".to_vec());
        assert!(matches!(
            SkinTexture::decode(&payload),
            Err(ViewportError::AssetLoadFailed(_))
        ));
    }
}
