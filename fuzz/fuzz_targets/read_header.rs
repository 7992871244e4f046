#![no_main]
use libfuzzer_sys::fuzz_target;
use nifti_patches::NiftiHeader;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = NiftiHeader::from_reader(data) {
        let _ = header.dims();
        let _ = header.shape();
        let _ = header.data_type();
        let _ = header.data_offset();
        if let Ok(bytes) = header.to_bytes() {
            let _ = NiftiHeader::from_reader(&bytes[..]);
        }
    }
});
