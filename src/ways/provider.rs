// Wire-layer BufferProvider (spec §4.3: "a provider supplied by the
// wire layer"). Downcasts a ClientBuffer's opaque handle back to
// whichever concrete wl_buffer userdata produced it - the wl_shm path
// (shm.rs::ShmBufferData) or the linux-dmabuf path
// (dmabuf.rs::DmaBufferData) - without the core ever seeing either
// type directly.

use std::rc::Rc;

use crate::buffer::{BufferProvider, ClientBuffer, DmaPlane, ShmFormat};
use crate::ways::dmabuf::DmaBufferData;
use crate::ways::shm::ShmBufferData;

pub struct WireBufferProvider;

impl BufferProvider for WireBufferProvider {
    fn is_shm(&self, buffer: &ClientBuffer) -> bool {
        buffer.downcast::<Rc<ShmBufferData>>().is_some()
    }

    fn is_dmabuf(&self, buffer: &ClientBuffer) -> bool {
        buffer.downcast::<Rc<DmaBufferData>>().is_some()
    }

    fn shm_dimensions(&self, buffer: &ClientBuffer) -> (i32, i32, i32, ShmFormat) {
        let buf = buffer.downcast::<Rc<ShmBufferData>>().expect("not an shm buffer");
        (buf.width, buf.height, buf.stride, buf.format)
    }

    fn shm_access(&self, buffer: &ClientBuffer) -> squall_utils::MemImage {
        let buf = buffer.downcast::<Rc<ShmBufferData>>().expect("not an shm buffer");
        buf.mem_image()
    }

    fn dma_dimensions(&self, buffer: &ClientBuffer) -> (i32, i32, u32) {
        let buf = buffer.downcast::<Rc<DmaBufferData>>().expect("not a dmabuf buffer");
        (buf.width, buf.height, buf.format)
    }

    fn dma_modifier(&self, buffer: &ClientBuffer) -> (u32, u32) {
        let buf = buffer.downcast::<Rc<DmaBufferData>>().expect("not a dmabuf buffer");
        buf.modifier
    }

    fn dma_planes(&self, buffer: &ClientBuffer) -> Vec<DmaPlane> {
        let buf = buffer.downcast::<Rc<DmaBufferData>>().expect("not a dmabuf buffer");
        buf.planes.clone()
    }
}
