// Buffer Adapter (C1)
//
// Translates an opaque client-side buffer handle into a uniform
// Buffer descriptor the render path can consume, without the core
// ever needing to know whether the client used wl_shm or
// zwp_linux_dmabuf_v1. Grounded on the split between
// ways::shm::ShmBuffer and ways::linux_dmabuf in the teacher, unified
// here behind one BufferProvider trait instead of two ad hoc
// extraction paths.

use squall_utils::MemImage;
use std::os::unix::io::RawFd;
use std::rc::Rc;

/// Opaque handle to a client-owned buffer resource.
///
/// Non-owning: the handle is a reference into wire-layer state the
/// client still owns. The adapter below only ever borrows through it
/// for the duration of one render.
#[derive(Clone)]
pub struct ClientBuffer {
    inner: Rc<dyn std::any::Any>,
}

impl ClientBuffer {
    pub fn new(inner: Rc<dyn std::any::Any>) -> ClientBuffer {
        ClientBuffer { inner }
    }

    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

/// Per-plane description of a DMA-capable image.
#[derive(Debug, Clone, Copy)]
pub struct DmaPlane {
    pub fd: RawFd,
    pub stride: u32,
    pub offset: u32,
}

/// Everything the Buffer Adapter needs to read out of a client buffer
/// handle, supplied by the wire layer. This is the "provider" the
/// spec defers responsibility for to the wire demultiplexer.
pub trait BufferProvider {
    /// True if `buffer` is backed by a wl_shm pool.
    fn is_shm(&self, buffer: &ClientBuffer) -> bool;
    /// True if `buffer` is backed by a linux-dmabuf plane set.
    fn is_dmabuf(&self, buffer: &ClientBuffer) -> bool;

    fn shm_dimensions(&self, buffer: &ClientBuffer) -> (i32, i32, i32, ShmFormat);
    fn shm_access(&self, buffer: &ClientBuffer) -> MemImage;

    fn dma_dimensions(&self, buffer: &ClientBuffer) -> (i32, i32, u32);
    /// Returns (modifier_hi, modifier_lo) as wl_buffer/linux-dmabuf
    /// wire format halves.
    fn dma_modifier(&self, buffer: &ClientBuffer) -> (u32, u32);
    fn dma_planes(&self, buffer: &ClientBuffer) -> Vec<DmaPlane>;

    /// A cheap (width, height) query used at commit time to update
    /// `current.width`/`current.height` (spec §3) without doing the
    /// full import that render() performs later - commit must not
    /// pay the cost of mapping/importing a buffer it may never draw.
    fn shm_or_dma_size(&self, buffer: &ClientBuffer) -> (i32, i32) {
        if self.is_shm(buffer) {
            let (w, h, _, _) = self.shm_dimensions(buffer);
            (w, h)
        } else {
            let (w, h, _) = self.dma_dimensions(buffer);
            (w, h)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmFormat {
    Argb8888,
    Xrgb8888,
}

/// A short-lived, CPU-mapped view into a shm buffer. `begin_access`
/// and `end_access` bracket each CPU read and must never be nested
/// (spec §5, "Shared resources").
pub struct SharedMemoryImage {
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: ShmFormat,
    image: MemImage,
    in_access: bool,
}

impl SharedMemoryImage {
    pub fn begin_access(&mut self) -> (*const u8, usize) {
        assert!(!self.in_access, "begin_access called while already accessing");
        self.in_access = true;
        (self.image.as_slice().as_ptr(), self.image.as_slice().len())
    }

    pub fn end_access(&mut self) {
        assert!(self.in_access, "end_access called without a matching begin_access");
        self.in_access = false;
    }
}

/// A DMA-capable planar image, up to 4 planes, as advertised by
/// zwp_linux_dmabuf_v1.
pub struct DmaImage {
    pub width: i32,
    pub height: i32,
    pub format: u32,
    pub modifier: (u32, u32),
    pub planes: Vec<DmaPlane>,
}

/// The descriptor handed to Output::render, conforming to spec §3.
pub enum Buffer {
    Shm(SharedMemoryImage),
    Dma(DmaImage),
}

impl Buffer {
    /// `good()` is true iff dimensions are positive and, for DMA, at
    /// least one plane is present.
    pub fn good(&self) -> bool {
        match self {
            Buffer::Shm(img) => img.width > 0 && img.height > 0,
            Buffer::Dma(img) => img.width > 0 && img.height > 0 && !img.planes.is_empty(),
        }
    }

    pub fn width(&self) -> i32 {
        match self {
            Buffer::Shm(img) => img.width,
            Buffer::Dma(img) => img.width,
        }
    }

    pub fn height(&self) -> i32 {
        match self {
            Buffer::Shm(img) => img.height,
            Buffer::Dma(img) => img.height,
        }
    }
}

/// Import a client buffer handle through `provider`, producing a
/// short-lived Buffer descriptor. Discriminates shm vs. dma via the
/// provider predicate, the only place this module looks at the
/// concrete buffer type.
pub fn import(handle: &ClientBuffer, provider: &dyn BufferProvider) -> squall_utils::Result<Buffer> {
    if provider.is_shm(handle) {
        let (width, height, stride, format) = provider.shm_dimensions(handle);
        let image = provider.shm_access(handle);
        return Ok(Buffer::Shm(SharedMemoryImage {
            width,
            height,
            stride,
            format,
            image,
            in_access: false,
        }));
    }

    if provider.is_dmabuf(handle) {
        let (width, height, format) = provider.dma_dimensions(handle);
        let modifier = provider.dma_modifier(handle);
        let planes = provider.dma_planes(handle);
        return Ok(Buffer::Dma(DmaImage {
            width,
            height,
            format,
            modifier,
            planes,
        }));
    }

    Err(squall_utils::anyhow!(
        "client buffer is neither a recognized shm pool nor a dmabuf"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeShm;
    impl BufferProvider for FakeShm {
        fn is_shm(&self, _b: &ClientBuffer) -> bool {
            true
        }
        fn is_dmabuf(&self, _b: &ClientBuffer) -> bool {
            false
        }
        fn shm_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, i32, ShmFormat) {
            (4, 4, 16, ShmFormat::Argb8888)
        }
        fn shm_access(&self, _b: &ClientBuffer) -> MemImage {
            MemImage::new(std::ptr::null(), 4, 4, 4)
        }
        fn dma_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, u32) {
            unreachable!()
        }
        fn dma_modifier(&self, _b: &ClientBuffer) -> (u32, u32) {
            unreachable!()
        }
        fn dma_planes(&self, _b: &ClientBuffer) -> Vec<DmaPlane> {
            unreachable!()
        }
    }

    struct FakeDma;
    impl BufferProvider for FakeDma {
        fn is_shm(&self, _b: &ClientBuffer) -> bool {
            false
        }
        fn is_dmabuf(&self, _b: &ClientBuffer) -> bool {
            true
        }
        fn shm_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, i32, ShmFormat) {
            unreachable!()
        }
        fn shm_access(&self, _b: &ClientBuffer) -> MemImage {
            unreachable!()
        }
        fn dma_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, u32) {
            (1920, 1080, 0x34325258 /* XR24 */)
        }
        fn dma_modifier(&self, _b: &ClientBuffer) -> (u32, u32) {
            (0, 0)
        }
        fn dma_planes(&self, _b: &ClientBuffer) -> Vec<DmaPlane> {
            vec![DmaPlane {
                fd: -1,
                stride: 7680,
                offset: 0,
            }]
        }
    }

    struct FakeNeither;
    impl BufferProvider for FakeNeither {
        fn is_shm(&self, _b: &ClientBuffer) -> bool {
            false
        }
        fn is_dmabuf(&self, _b: &ClientBuffer) -> bool {
            false
        }
        fn shm_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, i32, ShmFormat) {
            unreachable!()
        }
        fn shm_access(&self, _b: &ClientBuffer) -> MemImage {
            unreachable!()
        }
        fn dma_dimensions(&self, _b: &ClientBuffer) -> (i32, i32, u32) {
            unreachable!()
        }
        fn dma_modifier(&self, _b: &ClientBuffer) -> (u32, u32) {
            unreachable!()
        }
        fn dma_planes(&self, _b: &ClientBuffer) -> Vec<DmaPlane> {
            unreachable!()
        }
    }

    fn dummy_handle() -> ClientBuffer {
        ClientBuffer::new(Rc::new(()))
    }

    #[test]
    fn shm_import_is_good_when_positive() {
        let buf = import(&dummy_handle(), &FakeShm).unwrap();
        assert!(buf.good());
        assert_eq!(buf.width(), 4);
    }

    #[test]
    fn dma_import_is_good_with_one_plane() {
        let buf = import(&dummy_handle(), &FakeDma).unwrap();
        assert!(buf.good());
    }

    #[test]
    fn dma_with_no_planes_is_not_good() {
        let img = DmaImage {
            width: 10,
            height: 10,
            format: 0,
            modifier: (0, 0),
            planes: Vec::new(),
        };
        assert!(!Buffer::Dma(img).good());
    }

    #[test]
    fn neither_shm_nor_dma_is_an_error() {
        assert!(import(&dummy_handle(), &FakeNeither).is_err());
    }

    #[test]
    fn zero_dimension_is_not_good() {
        let img = SharedMemoryImage {
            width: 0,
            height: 4,
            stride: 0,
            format: ShmFormat::Argb8888,
            image: MemImage::new(std::ptr::null(), 4, 0, 4),
            in_access: false,
        };
        assert!(!Buffer::Shm(img).good());
    }
}
