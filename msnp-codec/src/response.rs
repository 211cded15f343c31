//! Parser for server-originated commands.

use abnf_core::streaming::{crlf, sp};
use msnp_types::{
    command::{PrivacySetting, RemTarget, ReversePrompt},
    core::{Email, Guid, TrId},
    error::ServerError,
    list::{List, ListSet},
    response::{LstEntry, OutReason, ServerCommand},
    utils::unescape,
};
use nom::{
    bytes::streaming::{tag, take},
    combinator::{map, map_res, opt},
    multi::{many0, many1},
    sequence::{preceded, terminated, tuple},
};

use crate::{
    codec::decode::{MsnpErrorKind, MsnpParseError, MsnpResult},
    core::{
        capabilities, email, endpoint, escaped_text, guid, msn_object, number, opaque_token,
        session_id, status, token, trid,
    },
};

fn fail<I, O>(input: I) -> MsnpResult<I, O> {
    Err(nom::Err::Failure(MsnpParseError {
        input,
        kind: MsnpErrorKind::BadValue,
    }))
}

/// `server-command = identifier *(SP argument) CRLF [payload]`
///
/// The identifier is dispatched by name; 3-digit identifiers decode as
/// [`ServerCommand::Error`]. Unknown identifiers fail (the framing layer
/// skips the offending line).
pub(crate) fn server_command(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, name) = token(input)?;

    match name {
        "VER" => ver(rest),
        "CVR" => cvr(rest),
        "USR" => usr(rest),
        "XFR" => xfr(rest),
        "QRY" => qry(rest),
        "CHL" => chl(rest),
        "CHG" => chg(rest),
        "ILN" => iln(rest),
        "NLN" => nln(rest),
        "FLN" => fln(rest),
        "UBX" => ubx(rest),
        "UUX" => uux(rest),
        "PRP" => prp(rest),
        "SBP" => sbp(rest),
        "BPR" => bpr(rest),
        "SYN" => syn(rest),
        "GTC" => gtc(rest),
        "BLP" => blp(rest),
        "LSG" => lsg(rest),
        "LST" => lst(rest),
        "ADC" => adc(rest),
        "REM" => rem(rest),
        "ADG" => adg(rest),
        "RMG" => rmg(rest),
        "REG" => reg(rest),
        "MSG" => msg(rest),
        "RNG" => rng(rest),
        "CAL" => cal(rest),
        "ANS" => ans(rest),
        "JOI" => joi(rest),
        "IRO" => iro(rest),
        "BYE" => bye(rest),
        "ACK" => ack(rest),
        "NAK" => nak(rest),
        "QNG" => qng(rest),
        "NOT" => not(rest),
        "OUT" => out(rest),
        "SBS" => sbs(rest),
        _ if name.len() == 3 && name.bytes().all(|b| b.is_ascii_digit()) => {
            // # Safety
            //
            // `unwrap` is safe because the identifier is `3DIGIT`.
            let code = ServerError::from_code(name.parse::<u16>().unwrap());
            error(code, rest)
        }
        _ => Err(nom::Err::Error(MsnpParseError {
            input,
            kind: MsnpErrorKind::UnknownCommand,
        })),
    }
}

/// `VER <trid> 1*(SP <dialect>)`
fn ver(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, dialects)) = terminated(
        tuple((
            preceded(sp, trid),
            many1(preceded(sp, map(token, String::from))),
        )),
        crlf,
    )(input)?;

    Ok((rest, ServerCommand::Ver { trid: id, dialects }))
}

/// `CVR <trid> *(SP <arg>)` — recommended versions and download URLs.
fn cvr(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, args)) = terminated(
        tuple((
            preceded(sp, trid),
            many0(preceded(sp, map(token, String::from))),
        )),
        crlf,
    )(input)?;

    Ok((rest, ServerCommand::Cvr { trid: id, args }))
}

/// `USR <trid> TWN S <policy>` / `USR <trid> OK <login> *(SP <arg>)`
fn usr(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, id) = preceded(sp, trid)(input)?;
    let (rest, word) = preceded(sp, token)(rest)?;

    match word {
        "TWN" => {
            let (rest, policy) = terminated(
                preceded(tuple((sp, tag(b"S"), sp)), map(token, String::from)),
                crlf,
            )(rest)?;

            Ok((rest, ServerCommand::UsrTwnS { trid: id, policy }))
        }
        "OK" => {
            let (rest, (login, args)) = terminated(
                tuple((
                    preceded(sp, email),
                    many0(preceded(sp, map(token, String::from))),
                )),
                crlf,
            )(rest)?;

            Ok((
                rest,
                ServerCommand::UsrOk {
                    trid: id,
                    login,
                    args,
                },
            ))
        }
        _ => fail(input),
    }
}

/// `XFR <trid> NS <endpoint> [<arg> [<backup>]]` /
/// `XFR <trid> SB <endpoint> CKI <ticket>`
fn xfr(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, id) = preceded(sp, trid)(input)?;
    let (rest, word) = preceded(sp, token)(rest)?;

    match word {
        "NS" => {
            let (rest, (target, _, backup)) = terminated(
                tuple((
                    preceded(sp, endpoint),
                    opt(preceded(sp, token)),
                    opt(preceded(sp, endpoint)),
                )),
                crlf,
            )(rest)?;

            Ok((
                rest,
                ServerCommand::XfrNs {
                    trid: id,
                    endpoint: target,
                    backup,
                },
            ))
        }
        "SB" => {
            let (rest, (target, ticket)) = terminated(
                tuple((
                    preceded(sp, endpoint),
                    preceded(tuple((sp, tag(b"CKI"), sp)), opaque_token),
                )),
                crlf,
            )(rest)?;

            Ok((
                rest,
                ServerCommand::XfrSb {
                    trid: id,
                    endpoint: target,
                    ticket,
                },
            ))
        }
        _ => fail(input),
    }
}

/// `QRY <trid>`
fn qry(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, id) = terminated(preceded(sp, trid), crlf)(input)?;

    Ok((rest, ServerCommand::QryOk { trid: id }))
}

/// `CHL 0 <challenge>`
fn chl(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, challenge) = terminated(
        preceded(tuple((sp, number, sp)), map(token, String::from)),
        crlf,
    )(input)?;

    Ok((rest, ServerCommand::Chl { challenge }))
}

/// `CHG <trid> <status> <caps> [<object>]`
fn chg(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, st, caps, object)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, status),
            preceded(sp, capabilities),
            opt(preceded(sp, msn_object)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Chg {
            trid: id,
            status: st,
            capabilities: caps,
            object,
        },
    ))
}

/// `ILN <trid> <status> <login> <nick> <caps> [<object>]`
fn iln(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, st, login, nickname, caps, object)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, status),
            preceded(sp, email),
            preceded(sp, escaped_text),
            preceded(sp, capabilities),
            opt(preceded(sp, msn_object)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Iln {
            trid: id,
            status: st,
            login,
            nickname,
            capabilities: caps,
            object,
        },
    ))
}

/// `NLN <status> <login> <nick> <caps> [<object>]`
fn nln(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (st, login, nickname, caps, object)) = terminated(
        tuple((
            preceded(sp, status),
            preceded(sp, email),
            preceded(sp, escaped_text),
            preceded(sp, capabilities),
            opt(preceded(sp, msn_object)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Nln {
            status: st,
            login,
            nickname,
            capabilities: caps,
            object,
        },
    ))
}

/// `FLN <login>`
fn fln(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, login) = terminated(preceded(sp, email), crlf)(input)?;

    Ok((rest, ServerCommand::Fln { login }))
}

/// `UBX <login> <len>` + payload
fn ubx(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (login, len)) =
        terminated(tuple((preceded(sp, email), preceded(sp, number))), crlf)(input)?;
    let (rest, payload) = take(len)(rest)?;

    Ok((
        rest,
        ServerCommand::Ubx {
            login,
            payload: payload.to_vec(),
        },
    ))
}

/// `UUX <trid> <len>` + payload — the publication ack; the payload is
/// empty in practice and discarded otherwise.
fn uux(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, len)) =
        terminated(tuple((preceded(sp, trid), preceded(sp, number))), crlf)(input)?;
    let (rest, _payload) = take(len)(rest)?;

    Ok((rest, ServerCommand::UuxOk { trid: id }))
}

/// `PRP [<trid>] <property> [<value>]`
fn prp(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, first) = preceded(sp, token)(input)?;

    let (rest, id, property) = if first.bytes().all(|b| b.is_ascii_digit()) {
        // An all-digit first token that overflows u32 cannot be a trid;
        // treat it as the property name.
        match first.parse::<u32>() {
            Ok(id) => {
                let (rest, property) = preceded(sp, token)(rest)?;
                (rest, Some(TrId(id)), property)
            }
            Err(_) => (rest, None, first),
        }
    } else {
        (rest, None, first)
    };

    let (rest, value) = terminated(opt(preceded(sp, escaped_text)), crlf)(rest)?;

    Ok((
        rest,
        ServerCommand::Prp {
            trid: id,
            property: property.to_owned(),
            value: value.unwrap_or_default(),
        },
    ))
}

/// `SBP [<trid>] <guid> <property> <value>`
fn sbp(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, first) = preceded(sp, token)(input)?;

    let (rest, id, contact) = if first.bytes().all(|b| b.is_ascii_digit()) {
        match first.parse::<u32>() {
            Ok(id) => {
                let (rest, contact) = preceded(sp, guid)(rest)?;
                (rest, Some(TrId(id)), contact)
            }
            Err(_) => return fail(input),
        }
    } else {
        match Guid::try_from(first) {
            Ok(contact) => (rest, None, contact),
            Err(_) => return fail(input),
        }
    };

    let (rest, (property, value)) = terminated(
        tuple((
            preceded(sp, map(token, String::from)),
            opt(preceded(sp, escaped_text)),
        )),
        crlf,
    )(rest)?;

    Ok((
        rest,
        ServerCommand::Sbp {
            trid: id,
            guid: contact,
            property,
            value: value.unwrap_or_default(),
        },
    ))
}

/// `BPR <property> [<value>]`
fn bpr(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (property, value)) = terminated(
        tuple((
            preceded(sp, map(token, String::from)),
            opt(preceded(sp, escaped_text)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Bpr {
            property,
            value: value.unwrap_or_default(),
        },
    ))
}

/// `SYN <trid> <version1> <version2> <contacts> <groups>`
fn syn(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, version1, version2, contact_count, group_count)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
            preceded(sp, number),
            preceded(sp, number),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Syn {
            trid: id,
            version1,
            version2,
            contact_count,
            group_count,
        },
    ))
}

/// `GTC [<trid>] <A|N>`
fn gtc(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, setting)) = trid_then_setting::<ReversePrompt>(input)?;

    Ok((rest, ServerCommand::Gtc { trid: id, setting }))
}

/// `BLP [<trid>] <AL|BL>`
fn blp(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, setting)) = trid_then_setting::<PrivacySetting>(input)?;

    Ok((rest, ServerCommand::Blp { trid: id, setting }))
}

/// Shared shape of `GTC`/`BLP`: an optional trid, then a keyword setting.
fn trid_then_setting<S>(input: &[u8]) -> MsnpResult<&[u8], (Option<TrId>, S)>
where
    S: std::str::FromStr<Err = msnp_types::error::ValidationError>,
{
    let (rest, first) = preceded(sp, token)(input)?;

    if first.bytes().all(|b| b.is_ascii_digit()) {
        let Ok(id) = first.parse::<u32>() else {
            return fail(input);
        };
        let (rest, setting) = terminated(preceded(sp, map_res(token, S::from_str)), crlf)(rest)?;

        Ok((rest, (Some(TrId(id)), setting)))
    } else {
        let Ok(setting) = S::from_str(first) else {
            return fail(input);
        };
        let (rest, _) = crlf(rest)?;

        Ok((rest, (None, setting)))
    }
}

/// `LSG <name> <guid>`
fn lsg(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (name, group)) = terminated(
        tuple((preceded(sp, escaped_text), preceded(sp, guid))),
        crlf,
    )(input)?;

    Ok((rest, ServerCommand::Lsg { name, guid: group }))
}

/// `LST N=<login> [F=<nick>] [C=<guid>] <lists> [<group-guids>]`
///
/// The `K=V` parameters come in any order; the first bare number is the
/// list bitmask and an optional comma-separated guid list follows for FL
/// members.
fn lst(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, args) = terminated(many1(preceded(sp, token)), crlf)(input)?;

    let mut login = None;
    let mut nickname = None;
    let mut contact_guid = None;
    let mut lists = None;
    let mut groups = Vec::new();

    for arg in args {
        if let Some(value) = arg.strip_prefix("N=") {
            match Email::try_from(value) {
                Ok(value) => login = Some(value),
                Err(_) => return fail(input),
            }
        } else if let Some(value) = arg.strip_prefix("F=") {
            nickname = Some(unescape(value).into_owned());
        } else if let Some(value) = arg.strip_prefix("C=") {
            match Guid::try_from(value) {
                Ok(value) => contact_guid = Some(value),
                Err(_) => return fail(input),
            }
        } else if lists.is_none() {
            match arg.parse::<u8>() {
                Ok(bits) => lists = Some(ListSet::from_bits(bits)),
                Err(_) => return fail(input),
            }
        } else {
            for piece in arg.split(',') {
                match Guid::try_from(piece) {
                    Ok(group) => groups.push(group),
                    Err(_) => return fail(input),
                }
            }
        }
    }

    let (Some(email), Some(lists)) = (login, lists) else {
        return fail(input);
    };

    Ok((
        rest,
        ServerCommand::Lst(LstEntry {
            email,
            nickname,
            guid: contact_guid,
            lists,
            groups,
        }),
    ))
}

/// `ADC <trid> <list> *(SP <K=V>) [<group-guid>]`
fn adc(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, list)) = tuple((
        preceded(sp, trid),
        preceded(sp, map_res(token, str::parse::<List>)),
    ))(input)?;
    let (rest, args) = terminated(many1(preceded(sp, token)), crlf)(rest)?;

    let mut login = None;
    let mut nickname = None;
    let mut contact_guid = None;
    let mut group = None;

    for arg in args {
        if let Some(value) = arg.strip_prefix("N=") {
            match Email::try_from(value) {
                Ok(value) => login = Some(value),
                Err(_) => return fail(input),
            }
        } else if let Some(value) = arg.strip_prefix("F=") {
            nickname = Some(unescape(value).into_owned());
        } else if let Some(value) = arg.strip_prefix("C=") {
            match Guid::try_from(value) {
                Ok(value) => contact_guid = Some(value),
                Err(_) => return fail(input),
            }
        } else {
            match Guid::try_from(arg) {
                Ok(value) => group = Some(value),
                Err(_) => return fail(input),
            }
        }
    }

    Ok((
        rest,
        ServerCommand::Adc {
            trid: id,
            list,
            email: login,
            nickname,
            guid: contact_guid,
            group,
        },
    ))
}

/// `REM <trid> <list> <target> [<group-guid>]`
fn rem(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, list, target, group)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map_res(token, str::parse::<List>)),
            preceded(sp, token),
            opt(preceded(sp, guid)),
        )),
        crlf,
    )(input)?;

    let target = if target.contains('@') {
        match Email::try_from(target) {
            Ok(value) => RemTarget::Email(value),
            Err(_) => return fail(input),
        }
    } else {
        match Guid::try_from(target) {
            Ok(value) => RemTarget::Guid(value),
            Err(_) => return fail(input),
        }
    };

    Ok((
        rest,
        ServerCommand::Rem {
            trid: id,
            list,
            target,
            group,
        },
    ))
}

/// `ADG <trid> <name> <guid>`
fn adg(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, name, group)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, escaped_text),
            preceded(sp, guid),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Adg {
            trid: id,
            name,
            guid: group,
        },
    ))
}

/// `RMG <trid> <guid>`
fn rmg(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, group)) =
        terminated(tuple((preceded(sp, trid), preceded(sp, guid))), crlf)(input)?;

    Ok((rest, ServerCommand::Rmg { trid: id, guid: group }))
}

/// `REG <trid> <guid> <name>`
fn reg(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, group, name)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, guid),
            preceded(sp, escaped_text),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Reg {
            trid: id,
            guid: group,
            name,
        },
    ))
}

/// `MSG <sender> <nick> <len>` + payload
fn msg(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (sender, nickname, len)) = terminated(
        tuple((
            preceded(sp, email),
            preceded(sp, escaped_text),
            preceded(sp, number),
        )),
        crlf,
    )(input)?;
    let (rest, payload) = take(len)(rest)?;

    Ok((
        rest,
        ServerCommand::Msg {
            sender,
            nickname,
            payload: payload.to_vec(),
        },
    ))
}

/// `RNG <session> <endpoint> CKI <ticket> <login> <nick>`
fn rng(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (session, target, ticket, login, nickname)) = terminated(
        tuple((
            preceded(sp, session_id),
            preceded(sp, endpoint),
            preceded(tuple((sp, tag(b"CKI"), sp)), opaque_token),
            preceded(sp, email),
            preceded(sp, escaped_text),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Rng {
            session,
            endpoint: target,
            ticket,
            login,
            nickname,
        },
    ))
}

/// `CAL <trid> RINGING <session>`
fn cal(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, session)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(tuple((sp, tag(b"RINGING"), sp)), session_id),
        )),
        crlf,
    )(input)?;

    Ok((rest, ServerCommand::CalRinging { trid: id, session }))
}

/// `ANS <trid> OK`
fn ans(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, id) = terminated(
        terminated(preceded(sp, trid), tuple((sp, tag(b"OK")))),
        crlf,
    )(input)?;

    Ok((rest, ServerCommand::AnsOk { trid: id }))
}

/// `JOI <login> <nick> [<caps>]`
fn joi(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (login, nickname, caps)) = terminated(
        tuple((
            preceded(sp, email),
            preceded(sp, escaped_text),
            opt(preceded(sp, capabilities)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Joi {
            login,
            nickname,
            capabilities: caps,
        },
    ))
}

/// `IRO <trid> <index> <total> <login> <nick> [<caps>]`
fn iro(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (id, index, total, login, nickname, caps)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, number),
            preceded(sp, number),
            preceded(sp, email),
            preceded(sp, escaped_text),
            opt(preceded(sp, capabilities)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Iro {
            trid: id,
            index,
            total,
            login,
            nickname,
            capabilities: caps,
        },
    ))
}

/// `BYE <login> [1]`
fn bye(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, (login, flag)) = terminated(
        tuple((preceded(sp, email), opt(preceded(sp, number)))),
        crlf,
    )(input)?;

    Ok((
        rest,
        ServerCommand::Bye {
            login,
            idle: flag == Some(1),
        },
    ))
}

/// `ACK <trid>`
fn ack(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, id) = terminated(preceded(sp, trid), crlf)(input)?;

    Ok((rest, ServerCommand::Ack { trid: id }))
}

/// `NAK <trid>`
fn nak(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, id) = terminated(preceded(sp, trid), crlf)(input)?;

    Ok((rest, ServerCommand::Nak { trid: id }))
}

/// `QNG <seconds>`
fn qng(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, until_next) = terminated(preceded(sp, number), crlf)(input)?;

    Ok((rest, ServerCommand::Qng { until_next }))
}

/// `NOT <len>` + payload
fn not(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, len) = terminated(preceded(sp, number), crlf)(input)?;
    let (rest, payload) = take(len)(rest)?;

    Ok((
        rest,
        ServerCommand::Not {
            payload: payload.to_vec(),
        },
    ))
}

/// `OUT [<reason>]`
fn out(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, reason) = terminated(opt(preceded(sp, token)), crlf)(input)?;

    let reason = match reason {
        Some("OTH") => Some(OutReason::OtherClient),
        Some("SSD") => Some(OutReason::ServerShutdown),
        // Unknown reason codes are not worth failing a logout over.
        _ => None,
    };

    Ok((rest, ServerCommand::Out { reason }))
}

/// `SBS *(SP <arg>)` — partially documented; preserved verbatim.
fn sbs(input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, args) = terminated(many0(preceded(sp, map(token, String::from))), crlf)(input)?;

    Ok((rest, ServerCommand::Sbs { args }))
}

/// `<3DIGIT> <trid>`
fn error(code: ServerError, input: &[u8]) -> MsnpResult<&[u8], ServerCommand> {
    let (rest, id) = terminated(preceded(sp, trid), crlf)(input)?;

    Ok((rest, ServerCommand::Error { trid: id, code }))
}

#[cfg(test)]
mod tests {
    use msnp_types::{core::Endpoint, presence::Status};

    use super::*;

    fn parse(input: &[u8]) -> ServerCommand {
        let (rest, command) = server_command(input).unwrap();
        assert!(rest.is_empty());
        command
    }

    #[test]
    fn test_rng() {
        let command = parse(
            b"RNG 11752013 207.46.108.38:1863 CKI 849102291.520491113 \
              example@passport.com Example%20Name\r\n",
        );

        match command {
            ServerCommand::Rng {
                session,
                endpoint,
                login,
                nickname,
                ..
            } => {
                assert_eq!(session.as_str(), "11752013");
                assert_eq!(endpoint, Endpoint::new("207.46.108.38", 1863));
                assert_eq!(login.as_str(), "example@passport.com");
                assert_eq!(nickname, "Example Name");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_nln_with_and_without_object() {
        let bare = parse(b"NLN NLN a@b.c Nick 268435456\r\n");
        match bare {
            ServerCommand::Nln { status, object, .. } => {
                assert_eq!(status, Status::Online);
                assert!(object.is_none());
            }
            other => panic!("unexpected: {other:?}"),
        }

        let with_object = parse(b"NLN AWY a@b.c Nick 0 %3Cmsnobj%20/%3E\r\n");
        match with_object {
            ServerCommand::Nln { status, object, .. } => {
                assert_eq!(status, Status::Away);
                assert!(object.is_some());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_lst_forward_member() {
        let command = parse(
            b"LST N=a@b.c F=Nick%20A C=d57283f5-b92a-4e7e-88cb-d0327f534a50 13 \
              f3e85f90-58c3-47e7-8e4d-d5d5d20c5e49,03fbbeca-128f-4a0d-b9a5-50b6b0c15e5f\r\n",
        );

        match command {
            ServerCommand::Lst(entry) => {
                assert_eq!(entry.email.as_str(), "a@b.c");
                assert_eq!(entry.nickname.as_deref(), Some("Nick A"));
                assert!(entry.guid.is_some());
                assert_eq!(entry.lists.bits(), 13);
                assert_eq!(entry.groups.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_lst_reverse_only() {
        let command = parse(b"LST N=stranger@c.d 8\r\n");

        match command {
            ServerCommand::Lst(entry) => {
                assert_eq!(entry.lists.bits(), 8);
                assert!(entry.nickname.is_none());
                assert!(entry.guid.is_none());
                assert!(entry.groups.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_msg_payload() {
        let command = parse(b"MSG a@b.c Nick 5\r\nhello");

        match command {
            ServerCommand::Msg { payload, .. } => assert_eq!(payload, b"hello"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_error_command() {
        let command = parse(b"911 4\r\n");

        assert_eq!(
            command,
            ServerCommand::Error {
                trid: TrId(4),
                code: ServerError::AuthenticationFailed,
            }
        );
    }

    #[test]
    fn test_prp_with_and_without_trid() {
        let sync_line = parse(b"PRP MFN My%20Name\r\n");
        match sync_line {
            ServerCommand::Prp { trid, property, value } => {
                assert_eq!(trid, None);
                assert_eq!(property, "MFN");
                assert_eq!(value, "My Name");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let reply = parse(b"PRP 9 MFN My%20Name\r\n");
        match reply {
            ServerCommand::Prp { trid, .. } => assert_eq!(trid, Some(TrId(9))),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_out_reasons() {
        assert_eq!(parse(b"OUT\r\n"), ServerCommand::Out { reason: None });
        assert_eq!(
            parse(b"OUT OTH\r\n"),
            ServerCommand::Out {
                reason: Some(OutReason::OtherClient)
            }
        );
    }

    #[test]
    fn test_unknown_identifier_fails() {
        assert!(server_command(b"WDW 1 2\r\n").is_err());
    }
}
