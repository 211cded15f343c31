//! Parser for client-originated commands.
//!
//! A client library mostly serializes these, but the parser makes scripted
//! test servers (and the inverse codec laws) possible.

use abnf_core::streaming::{crlf, sp};
use msnp_types::{
    command::{AdcTarget, Command, CommandBody, PrivacySetting, RemTarget, ReversePrompt},
    core::{ClientInfo, Email, Guid, TrId},
    list::List,
    message::DeliveryClass,
};
use nom::{
    bytes::streaming::{tag, take},
    combinator::{map, map_res, opt},
    multi::many1,
    sequence::{preceded, terminated, tuple},
};

use crate::{
    codec::decode::{MsnpErrorKind, MsnpParseError, MsnpResult},
    core::{
        capabilities, email, escaped_text, guid, msn_object, number, opaque_token, session_id,
        status, token, trid,
    },
};

fn fail<I, O>(input: I) -> MsnpResult<I, O> {
    Err(nom::Err::Failure(MsnpParseError {
        input,
        kind: MsnpErrorKind::BadValue,
    }))
}

/// `command = identifier [SP <trid>] *(SP argument) CRLF [payload]`
pub(crate) fn command(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, name) = token(input)?;

    let (rest, command) = match name {
        "VER" => ver(rest)?,
        "CVR" => cvr(rest)?,
        "USR" => usr(rest)?,
        "QRY" => qry(rest)?,
        "CHG" => chg(rest)?,
        "UUX" => uux(rest)?,
        "PRP" => prp(rest)?,
        "SBP" => sbp(rest)?,
        "SYN" => syn(rest)?,
        "ADC" => adc(rest)?,
        "REM" => rem(rest)?,
        "ADG" => adg(rest)?,
        "RMG" => rmg(rest)?,
        "REG" => reg(rest)?,
        "BLP" => blp(rest)?,
        "GTC" => gtc(rest)?,
        "XFR" => xfr(rest)?,
        "CAL" => cal(rest)?,
        "ANS" => ans(rest)?,
        "MSG" => msg(rest)?,
        "PNG" => {
            let (rest, _) = crlf(rest)?;
            (rest, Command { trid: None, body: CommandBody::Png })
        }
        "OUT" => {
            let (rest, _) = crlf(rest)?;
            (rest, Command { trid: None, body: CommandBody::Out })
        }
        _ => {
            return Err(nom::Err::Error(MsnpParseError {
                input,
                kind: MsnpErrorKind::UnknownCommand,
            }))
        }
    };

    Ok((rest, command))
}

fn with_trid(trid: TrId, body: CommandBody) -> Command {
    Command {
        trid: Some(trid),
        body,
    }
}

/// `VER <trid> 1*(SP <dialect>)`
fn ver(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, dialects)) = terminated(
        tuple((
            preceded(sp, trid),
            many1(preceded(sp, map(token, String::from))),
        )),
        crlf,
    )(input)?;

    Ok((rest, with_trid(id, CommandBody::Ver { dialects })))
}

/// `CVR <trid> <locale> <os> <osver> <arch> <client> <clientver> <id> <login>`
fn cvr(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, locale_id, os_type, os_version, arch, client_name, client_version, client_id)) =
        tuple((
            preceded(sp, trid),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
        ))(input)?;
    let (rest, login) = terminated(preceded(sp, email), crlf)(rest)?;

    Ok((
        rest,
        with_trid(
            id,
            CommandBody::Cvr {
                info: ClientInfo {
                    locale_id,
                    os_type,
                    os_version,
                    arch,
                    client_name,
                    client_version,
                    client_id,
                },
                login,
            },
        ),
    ))
}

/// `USR <trid> TWN I <login>` / `USR <trid> TWN S <ticket>` /
/// `USR <trid> <login> <ticket>` (switchboard join)
fn usr(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, id) = preceded(sp, trid)(input)?;
    let (rest, word) = preceded(sp, token)(rest)?;

    match word {
        "TWN" => {
            let (rest, step) = preceded(sp, token)(rest)?;

            match step {
                "I" => {
                    let (rest, login) = terminated(preceded(sp, email), crlf)(rest)?;
                    Ok((rest, with_trid(id, CommandBody::UsrTwnI { login })))
                }
                "S" => {
                    let (rest, ticket) = terminated(preceded(sp, opaque_token), crlf)(rest)?;
                    Ok((rest, with_trid(id, CommandBody::UsrTwnS { ticket })))
                }
                _ => fail(input),
            }
        }
        _ => {
            let Ok(login) = Email::try_from(word) else {
                return fail(input);
            };
            let (rest, ticket) = terminated(preceded(sp, opaque_token), crlf)(rest)?;

            Ok((rest, with_trid(id, CommandBody::UsrSb { login, ticket })))
        }
    }
}

/// `QRY <trid> <product-id> <len>` + digest payload
fn qry(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, product_id, len)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map(token, String::from)),
            preceded(sp, number),
        )),
        crlf,
    )(input)?;
    let (rest, digest) = map_res(take(len), std::str::from_utf8)(rest)?;

    Ok((
        rest,
        with_trid(
            id,
            CommandBody::Qry {
                product_id,
                digest: digest.to_owned(),
            },
        ),
    ))
}

/// `CHG <trid> <status> <caps> [<object>]`
fn chg(input: &[u8]) -> MsnpResult<&[u8], Command> {
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
        with_trid(
            id,
            CommandBody::Chg {
                status: st,
                capabilities: caps,
                object,
            },
        ),
    ))
}

/// `UUX <trid> <len>` + payload
fn uux(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, len)) =
        terminated(tuple((preceded(sp, trid), preceded(sp, number))), crlf)(input)?;
    let (rest, payload) = take(len)(rest)?;

    Ok((
        rest,
        with_trid(
            id,
            CommandBody::Uux {
                payload: payload.to_vec(),
            },
        ),
    ))
}

/// `PRP <trid> <property> [<value>]`
fn prp(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, property, value)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map(token, String::from)),
            opt(preceded(sp, escaped_text)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        with_trid(
            id,
            CommandBody::Prp {
                property,
                value: value.unwrap_or_default(),
            },
        ),
    ))
}

/// `SBP <trid> <guid> <property> <value>`
fn sbp(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, contact, property, value)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, guid),
            preceded(sp, map(token, String::from)),
            opt(preceded(sp, escaped_text)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        with_trid(
            id,
            CommandBody::Sbp {
                guid: contact,
                property,
                value: value.unwrap_or_default(),
            },
        ),
    ))
}

/// `SYN <trid> <version1> <version2>`
fn syn(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, version1, version2)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map(token, String::from)),
            preceded(sp, map(token, String::from)),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        with_trid(id, CommandBody::Syn { version1, version2 }),
    ))
}

/// `ADC <trid> <list> N=<login> [F=<nick>]` /
/// `ADC <trid> <list> C=<guid> [<group-guid>]`
fn adc(input: &[u8]) -> MsnpResult<&[u8], Command> {
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
            nickname = Some(msnp_types::utils::unescape(value).into_owned());
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

    let target = match (login, contact_guid) {
        (Some(email), None) => AdcTarget::ByEmail { email, nickname },
        (None, Some(contact)) => AdcTarget::ByGuid(contact),
        _ => return fail(input),
    };

    Ok((rest, with_trid(id, CommandBody::Adc { list, target, group })))
}

/// `REM <trid> <list> <target> [<group-guid>]`
fn rem(input: &[u8]) -> MsnpResult<&[u8], Command> {
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

    Ok((rest, with_trid(id, CommandBody::Rem { list, target, group })))
}

/// `ADG <trid> <name>`
fn adg(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, name)) =
        terminated(tuple((preceded(sp, trid), preceded(sp, escaped_text))), crlf)(input)?;

    Ok((rest, with_trid(id, CommandBody::Adg { name })))
}

/// `RMG <trid> <guid>`
fn rmg(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, group)) =
        terminated(tuple((preceded(sp, trid), preceded(sp, guid))), crlf)(input)?;

    Ok((rest, with_trid(id, CommandBody::Rmg { guid: group })))
}

/// `REG <trid> <guid> <name>`
fn reg(input: &[u8]) -> MsnpResult<&[u8], Command> {
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
        with_trid(id, CommandBody::Reg { guid: group, name }),
    ))
}

/// `BLP <trid> <AL|BL>`
fn blp(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, setting)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map_res(token, str::parse::<PrivacySetting>)),
        )),
        crlf,
    )(input)?;

    Ok((rest, with_trid(id, CommandBody::Blp { setting })))
}

/// `GTC <trid> <A|N>`
fn gtc(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, setting)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map_res(token, str::parse::<ReversePrompt>)),
        )),
        crlf,
    )(input)?;

    Ok((rest, with_trid(id, CommandBody::Gtc { setting })))
}

/// `XFR <trid> SB`
fn xfr(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, id) = terminated(
        terminated(preceded(sp, trid), tuple((sp, tag(b"SB")))),
        crlf,
    )(input)?;

    Ok((rest, with_trid(id, CommandBody::XfrSb)))
}

/// `CAL <trid> <login>`
fn cal(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, login)) =
        terminated(tuple((preceded(sp, trid), preceded(sp, email))), crlf)(input)?;

    Ok((rest, with_trid(id, CommandBody::Cal { login })))
}

/// `ANS <trid> <login> <ticket> <session>`
fn ans(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, login, ticket, session)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, email),
            preceded(sp, opaque_token),
            preceded(sp, session_id),
        )),
        crlf,
    )(input)?;

    Ok((
        rest,
        with_trid(
            id,
            CommandBody::Ans {
                login,
                ticket,
                session,
            },
        ),
    ))
}

/// `MSG <trid> <U|A|N> <len>` + payload
fn msg(input: &[u8]) -> MsnpResult<&[u8], Command> {
    let (rest, (id, class, len)) = terminated(
        tuple((
            preceded(sp, trid),
            preceded(sp, map_res(token, str::parse::<DeliveryClass>)),
            preceded(sp, number),
        )),
        crlf,
    )(input)?;
    let (rest, payload) = take(len)(rest)?;

    Ok((
        rest,
        with_trid(
            id,
            CommandBody::Msg {
                class,
                payload: payload.to_vec(),
            },
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Command {
        let (rest, command) = command(input).unwrap();
        assert!(rest.is_empty());
        command
    }

    #[test]
    fn test_usr_forms() {
        let twn_i = parse(b"USR 3 TWN I a@b.c\r\n");
        assert_eq!(twn_i.trid, Some(TrId(3)));
        assert!(matches!(twn_i.body, CommandBody::UsrTwnI { .. }));

        let twn_s = parse(b"USR 4 TWN S t=abc&p=def\r\n");
        assert!(matches!(twn_s.body, CommandBody::UsrTwnS { .. }));

        let sb = parse(b"USR 1 a@b.c 17890981.1032659\r\n");
        assert!(matches!(sb.body, CommandBody::UsrSb { .. }));
    }

    #[test]
    fn test_msg_with_payload() {
        let command = parse(b"MSG 7 A 5\r\nhello");

        match command.body {
            CommandBody::Msg { class, payload } => {
                assert_eq!(class, DeliveryClass::Acknowledged);
                assert_eq!(payload, b"hello");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_png_without_trid() {
        let command = parse(b"PNG\r\n");
        assert_eq!(command.trid, None);
        assert!(matches!(command.body, CommandBody::Png));
    }

    #[test]
    fn test_adc_by_email_and_by_guid() {
        let by_email = parse(b"ADC 21 FL N=new@b.c F=New%20Guy\r\n");
        match by_email.body {
            CommandBody::Adc {
                target: AdcTarget::ByEmail { email, nickname },
                group: None,
                ..
            } => {
                assert_eq!(email.as_str(), "new@b.c");
                assert_eq!(nickname.as_deref(), Some("New Guy"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let by_guid = parse(
            b"ADC 22 FL C=d57283f5-b92a-4e7e-88cb-d0327f534a50 \
              f3e85f90-58c3-47e7-8e4d-d5d5d20c5e49\r\n",
        );
        match by_guid.body {
            CommandBody::Adc {
                target: AdcTarget::ByGuid(_),
                group: Some(_),
                ..
            } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
