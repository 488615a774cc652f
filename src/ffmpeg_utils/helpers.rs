//! Safe wrappers around FFmpeg FFI calls.
//!
//! Every function in this module is `pub` and **safe** to call.  All `unsafe`
//! blocks are contained here with explicit safety arguments.  Callers outside
//! this module should never need to write `unsafe` for routine FFmpeg access.

use std::ffi::CString;
use std::ptr;

use bytes::Bytes;
use ffmpeg_next as ffmpeg;

use crate::error::FfmpegError;
use crate::media::{MediaParams, OutputStream};

// ── Codec-parameter field accessors ─────────────────────────────────────────

/// Read `sample_rate` from an `AVCodecParameters` struct.
///
/// `ffmpeg-next` does not expose this field through a safe accessor.
pub fn codec_params_sample_rate(params: &ffmpeg::codec::Parameters) -> u32 {
    // SAFETY: `params.as_ptr()` returns a valid non-null pointer for the
    // lifetime of `params`.  `sample_rate` is a plain i32 field with no
    // ownership semantics.
    unsafe { (*params.as_ptr()).sample_rate.max(0) as u32 }
}

/// Read `ch_layout.nb_channels` from an `AVCodecParameters` struct.
pub fn codec_params_channels(params: &ffmpeg::codec::Parameters) -> u16 {
    // SAFETY: same as `codec_params_sample_rate`.
    unsafe { (*params.as_ptr()).ch_layout.nb_channels.max(0) as u16 }
}

/// Native channel mask of `ch_layout`, or 0 for non-native orders.
pub fn codec_params_channel_layout(params: &ffmpeg::codec::Parameters) -> u64 {
    // SAFETY: `u.mask` is the active union member exactly when the order is
    // `AV_CHANNEL_ORDER_NATIVE`, which is checked first.
    unsafe {
        let layout = &(*params.as_ptr()).ch_layout;
        if matches!(
            layout.order,
            ffmpeg::ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE
        ) {
            layout.u.mask
        } else {
            0
        }
    }
}

/// Read `frame_size` from an `AVCodecParameters` struct.
pub fn codec_params_frame_size(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).frame_size.max(0) as u32 }
}

/// Read `block_align` from an `AVCodecParameters` struct.
pub fn codec_params_block_align(params: &ffmpeg::codec::Parameters) -> i32 {
    unsafe { (*params.as_ptr()).block_align }
}

/// Read `width` from an `AVCodecParameters` struct.
pub fn codec_params_width(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).width.max(0) as u32 }
}

/// Read `height` from an `AVCodecParameters` struct.
pub fn codec_params_height(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).height.max(0) as u32 }
}

/// Read the raw pixel/sample `format` from an `AVCodecParameters` struct.
pub fn codec_params_format(params: &ffmpeg::codec::Parameters) -> i32 {
    unsafe { (*params.as_ptr()).format }
}

/// Read `video_delay` (the B-frame reorder depth).
pub fn codec_params_video_delay(params: &ffmpeg::codec::Parameters) -> i32 {
    unsafe { (*params.as_ptr()).video_delay }
}

/// Read `bit_rate` from an `AVCodecParameters` struct.
pub fn codec_params_bit_rate(params: &ffmpeg::codec::Parameters) -> i64 {
    unsafe { (*params.as_ptr()).bit_rate }
}

/// Read `codec_tag` from an `AVCodecParameters` struct.
pub fn codec_params_codec_tag(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).codec_tag }
}

/// Copy the `extradata` blob out of an `AVCodecParameters` struct.
pub fn codec_params_extradata(params: &ffmpeg::codec::Parameters) -> Bytes {
    // SAFETY: `extradata` points to `extradata_size` readable bytes whenever
    // it is non-null; the bytes are copied before `params` can be dropped.
    unsafe {
        let p = params.as_ptr();
        let data = (*p).extradata;
        let size = (*p).extradata_size;
        if data.is_null() || size <= 0 {
            return Bytes::new();
        }
        Bytes::copy_from_slice(std::slice::from_raw_parts(data, size as usize))
    }
}

/// Apply the mapped output parameters that differ from a plain copy of the
/// input parameters.
///
/// Must be called after `out_stream.set_parameters(...)` and before
/// `write_header`.
pub fn stream_apply_output(out_stream: &mut ffmpeg::format::stream::StreamMut, output: &OutputStream) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream.  `codecpar` is set by `set_parameters` and is non-null.  Only
    // plain scalar fields are written.
    unsafe {
        let par = (*out_stream.as_mut_ptr()).codecpar;
        (*par).codec_tag = output.codec_tag;
        (*par).bit_rate = output.bit_rate;
        if let MediaParams::Audio(audio) = output.params {
            (*par).block_align = audio.block_align;
        }
    }
}

// ── Format lookup ───────────────────────────────────────────────────────────

/// Flags of the named output format, or `None` if no such muxer is compiled
/// into the linked FFmpeg.
pub fn output_format_flags(name: &str) -> Option<i32> {
    let name = CString::new(name).ok()?;
    // SAFETY: `av_guess_format` only reads the global muxer registry.  The
    // returned pointer refers to static data and is only dereferenced when
    // non-null.
    unsafe {
        let format = ffmpeg::ffi::av_guess_format(name.as_ptr(), ptr::null(), ptr::null());
        if format.is_null() {
            None
        } else {
            Some((*format).flags)
        }
    }
}

/// Whether the named output format stores codec configuration in its header.
pub fn output_format_requires_global_header(name: &str) -> Result<bool, FfmpegError> {
    let flags =
        output_format_flags(name).ok_or_else(|| FfmpegError::MuxerNotFound(name.to_string()))?;
    Ok(flags as u32 & ffmpeg::ffi::AVFMT_GLOBALHEADER != 0)
}

/// Open an input, optionally forcing the demuxer, and read its stream info.
pub fn open_input_as(
    source: &str,
    format_name: Option<&str>,
) -> Result<ffmpeg::format::context::Input, FfmpegError> {
    let Some(format_name) = format_name else {
        // `format::input` probes the streams itself
        return ffmpeg::format::input(&source)
            .map_err(|e| FfmpegError::OpenInput(format!("{}: {}", source, e)));
    };

    let url = CString::new(source)
        .map_err(|_| FfmpegError::OpenInput(format!("invalid source {:?}", source)))?;
    let name = CString::new(format_name)
        .map_err(|_| FfmpegError::DemuxerNotFound(format_name.to_string()))?;

    // SAFETY: `av_find_input_format` reads the global demuxer registry.
    // `avformat_open_input` either fills `ctx` with a context we own or frees
    // it and leaves it null on failure.  On a failed stream probe the context
    // is released with `avformat_close_input` before returning.  On success
    // ownership passes to `Input`, whose destructor closes it.
    unsafe {
        let format = ffmpeg::ffi::av_find_input_format(name.as_ptr());
        if format.is_null() {
            return Err(FfmpegError::DemuxerNotFound(format_name.to_string()));
        }

        let mut ctx = ptr::null_mut();
        let ret = ffmpeg::ffi::avformat_open_input(&mut ctx, url.as_ptr(), format, ptr::null_mut());
        if ret < 0 {
            return Err(FfmpegError::OpenInput(format!(
                "{}: {}",
                source,
                ffmpeg::Error::from(ret)
            )));
        }

        let ret = ffmpeg::ffi::avformat_find_stream_info(ctx, ptr::null_mut());
        if ret < 0 {
            ffmpeg::ffi::avformat_close_input(&mut ctx);
            return Err(FfmpegError::FindStreamInfo(format!(
                "{}: {}",
                source,
                ffmpeg::Error::from(ret)
            )));
        }

        Ok(ffmpeg::format::context::Input::wrap(ctx))
    }
}

// ── AVIO context management ──────────────────────────────────────────────────

/// Flush buffered bytes of the output's `AVIOContext` to the file.
pub fn flush_avio(output: &mut ffmpeg::format::context::Output) {
    // SAFETY: `output.as_mut_ptr()` is valid for the lifetime of `output`;
    // `pb` is either null or the context opened by `output_as`.
    unsafe {
        let ctx = output.as_mut_ptr();
        if !ctx.is_null() && !(*ctx).pb.is_null() {
            ffmpeg::ffi::avio_flush((*ctx).pb);
        }
    }
}

// ── Codec lookup ─────────────────────────────────────────────────────────────

/// Returns `true` if a decoder is registered for `codec_id`.
pub fn decoder_exists(codec_id: ffmpeg::codec::Id) -> bool {
    ffmpeg::decoder::find(codec_id).is_some()
}
