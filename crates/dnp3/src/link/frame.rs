//! Frame wire format and CRC framing.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use dnp3_dtyp::crc16_dnp;
use modular_bitfield::prelude::*;
use thiserror::Error;

pub const HEADER_LEN: usize = 10;
const START0: u8 = 0x05;
const START1: u8 = 0x64;
const BODY_BLOCK_LEN: usize = 16;
/// Header (10) + ceil(250/16) body blocks each with a 2-byte CRC.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + 250 + 16 * 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("checksum error")]
    ChecksumError,
    #[error("bad frame length")]
    BadLength,
    #[error("bad function code {0:#04x}")]
    BadFunctionCode(u8),
    #[error("frame control validity bit (FCV) rejected")]
    BadFCV,
    #[error("frame count bit (FCB) mismatch")]
    BadFCB,
    #[error("not enough bytes to decode a frame")]
    Incomplete,
    #[error("frame format error")]
    FrameFormatError,
}

/// Function codes carried in the low 4 bits of the control byte.
/// Primary-to-secondary and secondary-to-primary codes overlap in value
/// and are disambiguated by the `PRM` bit, mirroring the original wire
/// protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ResetLinkStates,
    TestLinkStates,
    ConfirmedUserData,
    UnconfirmedUserData,
    RequestLinkStatus,
    Ack,
    Nack,
    LinkStatus,
    NotSupported,
}

impl FunctionCode {
    fn code(self) -> u8 {
        match self {
            FunctionCode::ResetLinkStates => 0,
            FunctionCode::TestLinkStates => 2,
            FunctionCode::ConfirmedUserData => 3,
            FunctionCode::UnconfirmedUserData => 4,
            FunctionCode::RequestLinkStatus => 9,
            FunctionCode::Ack => 0,
            FunctionCode::Nack => 1,
            FunctionCode::LinkStatus => 11,
            FunctionCode::NotSupported => 15,
        }
    }

    fn from_code(code: u8, prm: bool) -> Result<Self, LinkError> {
        if prm {
            match code {
                0 => Ok(FunctionCode::ResetLinkStates),
                2 => Ok(FunctionCode::TestLinkStates),
                3 => Ok(FunctionCode::ConfirmedUserData),
                4 => Ok(FunctionCode::UnconfirmedUserData),
                9 => Ok(FunctionCode::RequestLinkStatus),
                other => Err(LinkError::BadFunctionCode(other)),
            }
        } else {
            match code {
                0 => Ok(FunctionCode::Ack),
                1 => Ok(FunctionCode::Nack),
                11 => Ok(FunctionCode::LinkStatus),
                15 => Ok(FunctionCode::NotSupported),
                other => Err(LinkError::BadFunctionCode(other)),
            }
        }
    }
}

/// Bit layout of the link control byte: `DIR|PRM|FCB|FCV|FC(4)`.
#[bitfield(bits = 8)]
#[derive(Clone, Copy, Default)]
struct ControlBits {
    function: B4,
    fcv: bool,
    fcb: bool,
    prm: bool,
    dir: bool,
}

/// The control byte, decomposed: `DIR|PRM|FCB|FCV|FC(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub dir: bool,
    pub prm: bool,
    pub fcb: bool,
    pub fcv: bool,
    pub function: FunctionCode,
}

impl Control {
    fn to_byte(self) -> u8 {
        ControlBits::new()
            .with_function(self.function.code())
            .with_fcv(self.fcv)
            .with_fcb(self.fcb)
            .with_prm(self.prm)
            .with_dir(self.dir)
            .into_bytes()[0]
    }

    fn from_byte(b: u8) -> Result<Self, LinkError> {
        let bits = ControlBits::from_bytes([b]);
        let prm = bits.prm();
        let function = FunctionCode::from_code(bits.function(), prm)?;
        Ok(Self {
            dir: bits.dir(),
            prm,
            fcb: bits.fcb(),
            fcv: bits.fcv(),
            function,
        })
    }
}

impl BinRead for Control {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let pos = reader.stream_position()?;
        let b = u8::read_le(reader)?;
        Control::from_byte(b).map_err(|e| binrw::Error::Custom {
            pos,
            err: Box::new(e),
        })
    }
}

impl BinWrite for Control {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        self.to_byte().write_le(writer)
    }
}

/// A complete link-layer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub control: Control,
    pub dest: u16,
    pub src: u16,
    pub data: Vec<u8>,
}

impl Frame {
    /// Encodes the frame: 10-byte header (CRC over the first 8 bytes) plus
    /// the user data split into <=16-byte body blocks, each followed by its
    /// own CRC-16/DNP.
    pub fn encode(&self) -> Result<Vec<u8>, LinkError> {
        if self.data.len() > 250 {
            return Err(LinkError::BadLength);
        }
        let len = 5 + self.data.len() as u8;
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_LEN + self.data.len() + 4));
        let w = &mut cursor;
        START0.write_le(w).expect("write to Vec cannot fail");
        START1.write_le(w).expect("write to Vec cannot fail");
        len.write_le(w).expect("write to Vec cannot fail");
        self.control.write_le(w).expect("write to Vec cannot fail");
        self.dest.write_le(w).expect("write to Vec cannot fail");
        self.src.write_le(w).expect("write to Vec cannot fail");
        let header_crc = crc16_dnp(&cursor.get_ref()[2..8]);
        header_crc.write_le(&mut cursor).expect("write to Vec cannot fail");

        for block in self.data.chunks(BODY_BLOCK_LEN) {
            cursor.get_mut().extend_from_slice(block);
            let pos = cursor.get_ref().len() as u64;
            cursor.set_position(pos);
            let crc = crc16_dnp(block);
            crc.write_le(&mut cursor).expect("write to Vec cannot fail");
        }
        Ok(cursor.into_inner())
    }

    /// Decodes one frame from the front of `buf`, returning the frame and
    /// the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), LinkError> {
        if buf.len() < HEADER_LEN {
            return Err(LinkError::Incomplete);
        }
        if buf[0] != START0 || buf[1] != START1 {
            return Err(LinkError::FrameFormatError);
        }
        let len = buf[2];
        if !(5..=255).contains(&len) {
            return Err(LinkError::BadLength);
        }
        let mut cursor = Cursor::new(&buf[8..10]);
        let header_crc = u16::read_le(&mut cursor).map_err(|_| LinkError::Incomplete)?;
        if crc16_dnp(&buf[2..8]) != header_crc {
            return Err(LinkError::ChecksumError);
        }
        let mut cursor = Cursor::new(&buf[3..8]);
        let control_byte = u8::read_le(&mut cursor).map_err(|_| LinkError::Incomplete)?;
        let control = Control::from_byte(control_byte)?;
        let dest = u16::read_le(&mut cursor).map_err(|_| LinkError::Incomplete)?;
        let src = u16::read_le(&mut cursor).map_err(|_| LinkError::Incomplete)?;

        let user_data_len = len as usize - 5;
        let mut data = Vec::with_capacity(user_data_len);
        let mut pos = HEADER_LEN;
        let mut remaining = user_data_len;
        while remaining > 0 {
            let block_len = remaining.min(BODY_BLOCK_LEN);
            if buf.len() < pos + block_len + 2 {
                return Err(LinkError::Incomplete);
            }
            let block = &buf[pos..pos + block_len];
            let mut crc_cursor = Cursor::new(&buf[pos + block_len..pos + block_len + 2]);
            let crc = u16::read_le(&mut crc_cursor).map_err(|_| LinkError::Incomplete)?;
            if crc16_dnp(block) != crc {
                return Err(LinkError::ChecksumError);
            }
            data.extend_from_slice(block);
            pos += block_len + 2;
            remaining -= block_len;
        }

        Ok((
            Frame {
                control,
                dest,
                src,
                data,
            },
            pos,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed_user_data_frame() -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: true,
                fcb: true,
                fcv: true,
                function: FunctionCode::ConfirmedUserData,
            },
            dest: 0x0001,
            src: 0x000A,
            data: vec![0xC0, 0xC1, 0x01, 0x3C, 0x02, 0x06],
        }
    }

    #[test]
    fn control_byte_round_trips_through_binrw() {
        let control = Control {
            dir: true,
            prm: true,
            fcb: true,
            fcv: true,
            function: FunctionCode::ConfirmedUserData,
        };
        let mut cursor = Cursor::new(Vec::new());
        control.write_le(&mut cursor).unwrap();
        assert_eq!(cursor.get_ref(), &[0xF3]);
        let mut cursor = Cursor::new(cursor.into_inner());
        let decoded = Control::read_le(&mut cursor).unwrap();
        assert_eq!(decoded, control);
    }

    #[test]
    fn link_frame_round_trip() {
        let frame = confirmed_user_data_frame();
        let encoded = frame.encode().unwrap();
        assert_eq!(&encoded[0..8], &[0x05, 0x64, 0x0B, 0xF3, 0x01, 0x00, 0x0A, 0x00]);
        assert_eq!(encoded.len(), HEADER_LEN + 6 + 2);

        let (decoded, consumed) = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn single_bit_flip_is_detected() {
        let frame = confirmed_user_data_frame();
        let mut encoded = frame.encode().unwrap();
        for i in 0..encoded.len() {
            let mut mutated = encoded.clone();
            mutated[i] ^= 0x01;
            let result = Frame::decode(&mutated);
            assert!(
                result.is_err(),
                "byte {i} flip was not detected: {mutated:?}"
            );
        }
        // sanity: the unmutated frame still decodes
        encoded.clear();
        encoded.extend(frame.encode().unwrap());
        assert!(Frame::decode(&encoded).is_ok());
    }

    #[test]
    fn multi_block_body_round_trips() {
        let frame = Frame {
            control: Control {
                dir: true,
                prm: true,
                fcb: false,
                fcv: false,
                function: FunctionCode::UnconfirmedUserData,
            },
            dest: 4,
            src: 1,
            data: (0..40u8).collect(),
        };
        let encoded = frame.encode().unwrap();
        let (decoded, consumed) = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, encoded.len());
    }
}
