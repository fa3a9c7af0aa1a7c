use core::panic::Location;
use core::ptr;

/// The source location an allocation was requested from.
///
/// Captured implicitly through `#[track_caller]` by the default entry
/// points, or passed explicitly through the `*_at` variants. The container
/// adapter passes [`AllocSite::UNKNOWN`], which renders as file `"?"`,
/// line `0`.
#[derive(Clone, Copy, Debug)]
pub struct AllocSite(Option<&'static Location<'static>>);

impl AllocSite {
    /// Synthetic site for allocations with no meaningful caller.
    pub const UNKNOWN: AllocSite = AllocSite(None);

    /// Capture the caller of the surrounding `#[track_caller]` chain.
    #[track_caller]
    #[inline]
    pub fn caller() -> AllocSite {
        AllocSite(Some(Location::caller()))
    }

    #[inline]
    pub fn file(self) -> &'static str {
        match self.0 {
            Some(loc) => loc.file(),
            None => "?",
        }
    }

    #[inline]
    pub fn line(self) -> u32 {
        match self.0 {
            Some(loc) => loc.line(),
            None => 0,
        }
    }

    /// One-word representation for the in-band metadata slot. Null encodes
    /// the unknown site; anything else is a `&'static Location`.
    #[inline]
    pub(crate) fn to_raw(self) -> *const Location<'static> {
        match self.0 {
            Some(loc) => loc as *const Location<'static>,
            None => ptr::null(),
        }
    }

    /// Rebuild a site from a metadata slot word.
    ///
    /// # Safety
    /// `raw` must be null or a pointer previously produced by
    /// [`AllocSite::to_raw`] (a `&'static Location`).
    #[inline]
    pub(crate) unsafe fn from_raw(raw: *const Location<'static>) -> AllocSite {
        if raw.is_null() {
            AllocSite(None)
        } else {
            AllocSite(Some(&*raw))
        }
    }
}
