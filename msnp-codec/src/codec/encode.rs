//! # Encoding of commands.
//!
//! [`Encoder::encode`] returns an [`Encoded`] value that can be iterated
//! over as [`Fragment`]s: header lines and payload byte runs. A writer
//! that keeps one `Encoded` at a time on the wire keeps header+payload
//! pairs contiguous, which the framing requires. [`Encoded::dump`]
//! concatenates everything for callers that hold the wire exclusively
//! anyway.
//!
//! ## Example
//!
//! ```rust
//! use msnp_codec::{
//!     encode::{Encoder, Fragment},
//!     msnp_types::{command::{Command, CommandBody}, core::TrId},
//!     CommandCodec,
//! };
//!
//! let command = Command::new(Some(TrId(1)), CommandBody::ver()).unwrap();
//!
//! assert_eq!(CommandCodec::default().encode(&command).dump(), b"VER 1 MSNP12 CVR0\r\n");
//! ```

use std::{collections::VecDeque, io::Write};

use msnp_types::{
    command::{AdcTarget, Command, CommandBody, RemTarget},
    response::{LstEntry, ServerCommand},
    utils::escape,
};

use crate::{CommandCodec, ServerCommandCodec};

/// Encoder.
///
/// Implemented for types that know how to encode a specific direction of
/// the protocol. See [implementors](trait.Encoder.html#implementors).
pub trait Encoder {
    type Message;

    /// Encode this message.
    fn encode(&self, message: &Self::Message) -> Encoded;
}

/// An encoded command.
///
/// Yields the serialization as [`Fragment`]s so that a writer can treat
/// the header line and the payload bytes as one unit.
#[derive(Clone, Debug)]
pub struct Encoded {
    items: VecDeque<Fragment>,
}

impl Encoded {
    /// Dump the (remaining) encoded data without being guided by
    /// [`Fragment`]s.
    pub fn dump(self) -> Vec<u8> {
        let mut out = Vec::new();

        for fragment in self.items {
            match fragment {
                Fragment::Line { mut data } => out.append(&mut data),
                Fragment::Payload { mut data } => out.append(&mut data),
            }
        }

        out
    }
}

impl Iterator for Encoded {
    type Item = Fragment;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.pop_front()
    }
}

/// One wire unit of an encoded command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Fragment {
    /// A CRLF-terminated header line.
    Line { data: Vec<u8> },

    /// A raw payload byte run that must directly follow its header line.
    Payload { data: Vec<u8> },
}

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct EncodeContext {
    accumulator: Vec<u8>,
    items: VecDeque<Fragment>,
}

impl EncodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self) {
        self.items.push_back(Fragment::Line {
            data: std::mem::take(&mut self.accumulator),
        })
    }

    pub fn push_payload(&mut self) {
        self.items.push_back(Fragment::Payload {
            data: std::mem::take(&mut self.accumulator),
        })
    }

    pub fn into_items(self) -> VecDeque<Fragment> {
        let Self {
            accumulator,
            mut items,
        } = self;

        if !accumulator.is_empty() {
            items.push_back(Fragment::Line { data: accumulator });
        }

        items
    }

    #[cfg(test)]
    pub(crate) fn dump(self) -> Vec<u8> {
        let mut out = Vec::new();

        for item in self.into_items() {
            match item {
                Fragment::Line { data } | Fragment::Payload { data } => {
                    out.extend_from_slice(&data)
                }
            }
        }

        out
    }
}

impl Write for EncodeContext {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.accumulator.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

macro_rules! impl_encoder_for_codec {
    ($codec:ty, $message:ty) => {
        impl Encoder for $codec {
            type Message = $message;

            fn encode(&self, message: &Self::Message) -> Encoded {
                let mut encode_context = EncodeContext::new();
                // Writing into a Vec cannot fail.
                EncodeIntoContext::encode_ctx(message, &mut encode_context).unwrap();

                Encoded {
                    items: encode_context.into_items(),
                }
            }
        }
    };
}

impl_encoder_for_codec!(CommandCodec, Command);
impl_encoder_for_codec!(ServerCommandCodec, ServerCommand);

// -------------------------------------------------------------------------------------------------

pub(crate) trait EncodeIntoContext {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()>;
}

impl EncodeIntoContext for Command {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        use CommandBody::*;

        write!(ctx, "{}", self.name())?;
        if let Some(trid) = self.trid {
            write!(ctx, " {trid}")?;
        }

        match &self.body {
            Ver { dialects } => {
                for dialect in dialects {
                    write!(ctx, " {dialect}")?;
                }
            }
            Cvr { info, login } => {
                write!(
                    ctx,
                    " {} {} {} {} {} {} {} {login}",
                    info.locale_id,
                    info.os_type,
                    info.os_version,
                    info.arch,
                    info.client_name,
                    info.client_version,
                    info.client_id,
                )?;
            }
            UsrTwnI { login } => write!(ctx, " TWN I {login}")?,
            UsrTwnS { ticket } => write!(ctx, " TWN S {ticket}")?,
            UsrSb { login, ticket } => write!(ctx, " {login} {ticket}")?,
            Qry { product_id, digest } => {
                write!(ctx, " {product_id} {}\r\n", digest.len())?;
                ctx.push_line();
                ctx.write_all(digest.as_bytes())?;
                ctx.push_payload();
                return Ok(());
            }
            Chg {
                status,
                capabilities,
                object,
            } => {
                write!(ctx, " {status} {capabilities}")?;
                if let Some(object) = object {
                    write!(ctx, " {object}")?;
                }
            }
            Uux { payload } => {
                write!(ctx, " {}\r\n", payload.len())?;
                ctx.push_line();
                ctx.write_all(payload)?;
                ctx.push_payload();
                return Ok(());
            }
            Prp { property, value } => {
                write!(ctx, " {property}")?;
                if !value.is_empty() {
                    write!(ctx, " {}", escape(value))?;
                }
            }
            Sbp {
                guid,
                property,
                value,
            } => {
                write!(ctx, " {guid} {property}")?;
                if !value.is_empty() {
                    write!(ctx, " {}", escape(value))?;
                }
            }
            Syn { version1, version2 } => write!(ctx, " {version1} {version2}")?,
            Adc { list, target, group } => {
                write!(ctx, " {list}")?;
                match target {
                    AdcTarget::ByEmail { email, nickname } => {
                        write!(ctx, " N={email}")?;
                        if let Some(nickname) = nickname {
                            write!(ctx, " F={}", escape(nickname))?;
                        }
                    }
                    AdcTarget::ByGuid(guid) => write!(ctx, " C={guid}")?,
                }
                if let Some(group) = group {
                    write!(ctx, " {group}")?;
                }
            }
            Rem { list, target, group } => {
                write!(ctx, " {list}")?;
                match target {
                    RemTarget::Email(email) => write!(ctx, " {email}")?,
                    RemTarget::Guid(guid) => write!(ctx, " {guid}")?,
                }
                if let Some(group) = group {
                    write!(ctx, " {group}")?;
                }
            }
            Adg { name } => write!(ctx, " {}", escape(name))?,
            Rmg { guid } => write!(ctx, " {guid}")?,
            Reg { guid, name } => write!(ctx, " {guid} {}", escape(name))?,
            Blp { setting } => write!(ctx, " {}", setting.as_str())?,
            Gtc { setting } => write!(ctx, " {}", setting.as_str())?,
            XfrSb => write!(ctx, " SB")?,
            Cal { login } => write!(ctx, " {login}")?,
            Ans {
                login,
                ticket,
                session,
            } => write!(ctx, " {login} {ticket} {session}")?,
            Msg { class, payload } => {
                write!(ctx, " {class} {}\r\n", payload.len())?;
                ctx.push_line();
                ctx.write_all(payload)?;
                ctx.push_payload();
                return Ok(());
            }
            Png | Out => {}
        }

        write!(ctx, "\r\n")?;
        ctx.push_line();

        Ok(())
    }
}

impl EncodeIntoContext for ServerCommand {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        use ServerCommand::*;

        match self {
            Ver { trid, dialects } => {
                write!(ctx, "VER {trid}")?;
                for dialect in dialects {
                    write!(ctx, " {dialect}")?;
                }
            }
            Cvr { trid, args } => {
                write!(ctx, "CVR {trid}")?;
                for arg in args {
                    write!(ctx, " {arg}")?;
                }
            }
            UsrTwnS { trid, policy } => write!(ctx, "USR {trid} TWN S {policy}")?,
            UsrOk { trid, login, args } => {
                write!(ctx, "USR {trid} OK {login}")?;
                for arg in args {
                    write!(ctx, " {arg}")?;
                }
            }
            XfrNs {
                trid,
                endpoint,
                backup,
            } => {
                write!(ctx, "XFR {trid} NS {endpoint}")?;
                if let Some(backup) = backup {
                    write!(ctx, " 0 {backup}")?;
                }
            }
            XfrSb {
                trid,
                endpoint,
                ticket,
            } => write!(ctx, "XFR {trid} SB {endpoint} CKI {ticket}")?,
            QryOk { trid } => write!(ctx, "QRY {trid}")?,
            Chl { challenge } => write!(ctx, "CHL 0 {challenge}")?,
            Chg {
                trid,
                status,
                capabilities,
                object,
            } => {
                write!(ctx, "CHG {trid} {status} {capabilities}")?;
                if let Some(object) = object {
                    write!(ctx, " {object}")?;
                }
            }
            Iln {
                trid,
                status,
                login,
                nickname,
                capabilities,
                object,
            } => {
                write!(
                    ctx,
                    "ILN {trid} {status} {login} {} {capabilities}",
                    escape(nickname)
                )?;
                if let Some(object) = object {
                    write!(ctx, " {object}")?;
                }
            }
            Nln {
                status,
                login,
                nickname,
                capabilities,
                object,
            } => {
                write!(
                    ctx,
                    "NLN {status} {login} {} {capabilities}",
                    escape(nickname)
                )?;
                if let Some(object) = object {
                    write!(ctx, " {object}")?;
                }
            }
            Fln { login } => write!(ctx, "FLN {login}")?,
            Ubx { login, payload } => {
                write!(ctx, "UBX {login} {}\r\n", payload.len())?;
                ctx.push_line();
                ctx.write_all(payload)?;
                ctx.push_payload();
                return Ok(());
            }
            UuxOk { trid } => write!(ctx, "UUX {trid} 0")?,
            Prp {
                trid,
                property,
                value,
            } => {
                write!(ctx, "PRP")?;
                if let Some(trid) = trid {
                    write!(ctx, " {trid}")?;
                }
                write!(ctx, " {property}")?;
                if !value.is_empty() {
                    write!(ctx, " {}", escape(value))?;
                }
            }
            Sbp {
                trid,
                guid,
                property,
                value,
            } => {
                write!(ctx, "SBP")?;
                if let Some(trid) = trid {
                    write!(ctx, " {trid}")?;
                }
                write!(ctx, " {guid} {property}")?;
                if !value.is_empty() {
                    write!(ctx, " {}", escape(value))?;
                }
            }
            Bpr { property, value } => {
                write!(ctx, "BPR {property}")?;
                if !value.is_empty() {
                    write!(ctx, " {}", escape(value))?;
                }
            }
            Syn {
                trid,
                version1,
                version2,
                contact_count,
                group_count,
            } => write!(
                ctx,
                "SYN {trid} {version1} {version2} {contact_count} {group_count}"
            )?,
            Gtc { trid, setting } => {
                write!(ctx, "GTC")?;
                if let Some(trid) = trid {
                    write!(ctx, " {trid}")?;
                }
                write!(ctx, " {}", setting.as_str())?;
            }
            Blp { trid, setting } => {
                write!(ctx, "BLP")?;
                if let Some(trid) = trid {
                    write!(ctx, " {trid}")?;
                }
                write!(ctx, " {}", setting.as_str())?;
            }
            Lsg { name, guid } => write!(ctx, "LSG {} {guid}", escape(name))?,
            Lst(entry) => encode_lst(entry, ctx)?,
            Adc {
                trid,
                list,
                email,
                nickname,
                guid,
                group,
            } => {
                write!(ctx, "ADC {trid} {list}")?;
                if let Some(email) = email {
                    write!(ctx, " N={email}")?;
                }
                if let Some(nickname) = nickname {
                    write!(ctx, " F={}", escape(nickname))?;
                }
                if let Some(guid) = guid {
                    write!(ctx, " C={guid}")?;
                }
                if let Some(group) = group {
                    write!(ctx, " {group}")?;
                }
            }
            Rem {
                trid,
                list,
                target,
                group,
            } => {
                write!(ctx, "REM {trid} {list}")?;
                match target {
                    RemTarget::Email(email) => write!(ctx, " {email}")?,
                    RemTarget::Guid(guid) => write!(ctx, " {guid}")?,
                }
                if let Some(group) = group {
                    write!(ctx, " {group}")?;
                }
            }
            Adg { trid, name, guid } => write!(ctx, "ADG {trid} {} {guid}", escape(name))?,
            Rmg { trid, guid } => write!(ctx, "RMG {trid} {guid}")?,
            Reg { trid, guid, name } => write!(ctx, "REG {trid} {guid} {}", escape(name))?,
            Msg {
                sender,
                nickname,
                payload,
            } => {
                write!(
                    ctx,
                    "MSG {sender} {} {}\r\n",
                    escape(nickname),
                    payload.len()
                )?;
                ctx.push_line();
                ctx.write_all(payload)?;
                ctx.push_payload();
                return Ok(());
            }
            Rng {
                session,
                endpoint,
                ticket,
                login,
                nickname,
            } => write!(
                ctx,
                "RNG {session} {endpoint} CKI {ticket} {login} {}",
                escape(nickname)
            )?,
            CalRinging { trid, session } => write!(ctx, "CAL {trid} RINGING {session}")?,
            AnsOk { trid } => write!(ctx, "ANS {trid} OK")?,
            Joi {
                login,
                nickname,
                capabilities,
            } => {
                write!(ctx, "JOI {login} {}", escape(nickname))?;
                if let Some(capabilities) = capabilities {
                    write!(ctx, " {capabilities}")?;
                }
            }
            Iro {
                trid,
                index,
                total,
                login,
                nickname,
                capabilities,
            } => {
                write!(
                    ctx,
                    "IRO {trid} {index} {total} {login} {}",
                    escape(nickname)
                )?;
                if let Some(capabilities) = capabilities {
                    write!(ctx, " {capabilities}")?;
                }
            }
            Bye { login, idle } => {
                write!(ctx, "BYE {login}")?;
                if *idle {
                    write!(ctx, " 1")?;
                }
            }
            Ack { trid } => write!(ctx, "ACK {trid}")?,
            Nak { trid } => write!(ctx, "NAK {trid}")?,
            Qng { until_next } => write!(ctx, "QNG {until_next}")?,
            Not { payload } => {
                write!(ctx, "NOT {}\r\n", payload.len())?;
                ctx.push_line();
                ctx.write_all(payload)?;
                ctx.push_payload();
                return Ok(());
            }
            Out { reason } => {
                write!(ctx, "OUT")?;
                if let Some(reason) = reason {
                    write!(ctx, " {}", reason.as_str())?;
                }
            }
            Sbs { args } => {
                write!(ctx, "SBS")?;
                for arg in args {
                    write!(ctx, " {arg}")?;
                }
            }
            Error { trid, code } => write!(ctx, "{:03} {trid}", code.code())?,
        }

        write!(ctx, "\r\n")?;
        ctx.push_line();

        Ok(())
    }
}

fn encode_lst(entry: &LstEntry, ctx: &mut EncodeContext) -> std::io::Result<()> {
    write!(ctx, "LST N={}", entry.email)?;
    if let Some(nickname) = &entry.nickname {
        write!(ctx, " F={}", escape(nickname))?;
    }
    if let Some(guid) = &entry.guid {
        write!(ctx, " C={guid}")?;
    }
    write!(ctx, " {}", entry.lists)?;
    if !entry.groups.is_empty() {
        let groups: Vec<&str> = entry.groups.iter().map(|guid| guid.as_str()).collect();
        write!(ctx, " {}", groups.join(","))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use msnp_types::{core::TrId, message::DeliveryClass};

    use super::*;

    #[test]
    fn test_fragments_of_payload_command() {
        let command = Command::new(
            Some(TrId(7)),
            CommandBody::Msg {
                class: DeliveryClass::Acknowledged,
                payload: b"hello".to_vec(),
            },
        )
        .unwrap();

        let fragments: Vec<Fragment> = CommandCodec.encode(&command).collect();

        assert_eq!(
            fragments,
            vec![
                Fragment::Line {
                    data: b"MSG 7 A 5\r\n".to_vec()
                },
                Fragment::Payload {
                    data: b"hello".to_vec()
                },
            ]
        );
    }

    #[test]
    fn test_line_command_dump() {
        let command = Command::new(Some(TrId(1)), CommandBody::ver()).unwrap();

        assert_eq!(CommandCodec.encode(&command).dump(), b"VER 1 MSNP12 CVR0\r\n");
    }
}
