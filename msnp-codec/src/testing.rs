//! Utilities for testing the codec laws.

use msnp_types::{command::Command, response::ServerCommand};

use crate::{
    codec::{
        decode::Decoder,
        encode::{EncodeContext, EncodeIntoContext, Encoder},
    },
    CommandCodec, ServerCommandCodec,
};

pub(crate) fn known_answer_test_encode(
    (test_object, expected_bytes): (impl EncodeIntoContext, impl AsRef<[u8]>),
) {
    let expected_bytes = expected_bytes.as_ref();
    let mut ctx = EncodeContext::new();
    test_object.encode_ctx(&mut ctx).unwrap();

    let got_bytes = ctx.dump();
    let got_bytes = got_bytes.as_slice();

    if expected_bytes != got_bytes {
        println!(
            "Left:  <<<{}>>>\nRight: <<<{}>>>",
            String::from_utf8_lossy(expected_bytes),
            String::from_utf8_lossy(got_bytes),
        );
        panic!("Left:  {:02x?}\nRight: {:02x?}", expected_bytes, got_bytes);
    }
}

// Note: Maybe there is a cleaner way to write this using generic bounds.
// However, the decode error types differ per decoder, so it's a macro for
// now.
macro_rules! impl_kat_inverse {
    ($fn_name:ident, $codec:ident, $item:ty) => {
        pub(crate) fn $fn_name(tests: &[(&[u8], &[u8], $item)]) {
            for (no, (test_input, expected_remainder, expected_object)) in tests.iter().enumerate()
            {
                println!("# {no}");

                let (got_remainder, got_object) = $codec
                    .decode(test_input)
                    .expect("first parsing failed");
                assert_eq!(*expected_object, got_object);
                assert_eq!(*expected_remainder, got_remainder);

                let got_output = $codec.encode(&got_object).dump();

                let (got_remainder, got_object_again) = $codec
                    .decode(&got_output)
                    .expect("second parsing failed");
                assert_eq!(got_object, got_object_again);
                assert!(got_remainder.is_empty());
            }
        }
    };
}

impl_kat_inverse! {kat_inverse_command, CommandCodec, Command}
impl_kat_inverse! {kat_inverse_server_command, ServerCommandCodec, ServerCommand}

#[cfg(test)]
mod tests {
    use msnp_types::{
        command::{CommandBody, PrivacySetting, ReversePrompt},
        core::{ClientInfo, Email, Endpoint, Guid, SessionId, Token, TrId},
        error::ServerError,
        list::{List, ListSet},
        message::DeliveryClass,
        presence::{Capabilities, MsnObject, Status},
        response::{LstEntry, OutReason, ServerCommand},
    };

    use super::*;

    fn email(value: &str) -> Email {
        Email::try_from(value).unwrap()
    }

    fn guid(value: &str) -> Guid {
        Guid::try_from(value).unwrap()
    }

    #[test]
    fn test_kat_inverse_command() {
        kat_inverse_command(&[
            (
                b"VER 1 MSNP12 CVR0\r\n".as_ref(),
                b"".as_ref(),
                Command::new(Some(TrId(1)), CommandBody::ver()).unwrap(),
            ),
            (
                b"CVR 2 0x0409 winnt 5.1 i386 MSNMSGR 8.0.0792 msmsgs a@b.c\r\n",
                b"",
                Command::new(
                    Some(TrId(2)),
                    CommandBody::Cvr {
                        info: ClientInfo::default(),
                        login: email("a@b.c"),
                    },
                )
                .unwrap(),
            ),
            (
                b"USR 3 TWN I a@b.c\r\n???",
                b"???",
                Command::new(
                    Some(TrId(3)),
                    CommandBody::UsrTwnI {
                        login: email("a@b.c"),
                    },
                )
                .unwrap(),
            ),
            (
                b"CHG 6 NLN 268435456\r\n",
                b"",
                Command::new(
                    Some(TrId(6)),
                    CommandBody::Chg {
                        status: Status::Online,
                        capabilities: Capabilities(268435456),
                        object: None,
                    },
                )
                .unwrap(),
            ),
            (
                b"CHG 7 AWY 0 %3Cmsnobj%2F%3E\r\n",
                b"",
                Command::new(
                    Some(TrId(7)),
                    CommandBody::Chg {
                        status: Status::Away,
                        capabilities: Capabilities(0),
                        object: Some(MsnObject::try_from("%3Cmsnobj%2F%3E").unwrap()),
                    },
                )
                .unwrap(),
            ),
            (
                b"PRP 8 MFN My%20Nick%25\r\n",
                b"",
                Command::new(
                    Some(TrId(8)),
                    CommandBody::Prp {
                        property: "MFN".into(),
                        value: "My Nick%".into(),
                    },
                )
                .unwrap(),
            ),
            (
                b"REG 10 d57283f5-b92a-4e7e-88cb-d0327f534a50 smama\r\n",
                b"",
                Command::new(
                    Some(TrId(10)),
                    CommandBody::Reg {
                        guid: guid("d57283f5-b92a-4e7e-88cb-d0327f534a50"),
                        name: "smama".into(),
                    },
                )
                .unwrap(),
            ),
            (
                b"BLP 11 AL\r\n",
                b"",
                Command::new(
                    Some(TrId(11)),
                    CommandBody::Blp {
                        setting: PrivacySetting::Allow,
                    },
                )
                .unwrap(),
            ),
            (
                b"GTC 12 N\r\n",
                b"",
                Command::new(
                    Some(TrId(12)),
                    CommandBody::Gtc {
                        setting: ReversePrompt::Silent,
                    },
                )
                .unwrap(),
            ),
            (
                b"XFR 13 SB\r\n",
                b"",
                Command::new(Some(TrId(13)), CommandBody::XfrSb).unwrap(),
            ),
            (
                b"ANS 1 me@b.c 849102291.520491113 11752013\r\n",
                b"",
                Command::new(
                    Some(TrId(1)),
                    CommandBody::Ans {
                        login: email("me@b.c"),
                        ticket: Token::try_from("849102291.520491113").unwrap(),
                        session: SessionId::try_from("11752013").unwrap(),
                    },
                )
                .unwrap(),
            ),
            (
                b"MSG 14 U 4\r\nabcdPNG",
                b"PNG",
                Command::new(
                    Some(TrId(14)),
                    CommandBody::Msg {
                        class: DeliveryClass::Unacknowledged,
                        payload: b"abcd".to_vec(),
                    },
                )
                .unwrap(),
            ),
            (
                b"QRY 15 msmsgs@msnmsgr.com 32\r\n0123456789abcdef0123456789abcdef",
                b"",
                Command::new(
                    Some(TrId(15)),
                    CommandBody::Qry {
                        product_id: "msmsgs@msnmsgr.com".into(),
                        digest: "0123456789abcdef0123456789abcdef".into(),
                    },
                )
                .unwrap(),
            ),
            (
                b"PNG\r\n",
                b"",
                Command::new(None, CommandBody::Png).unwrap(),
            ),
            (
                b"OUT\r\n",
                b"",
                Command::new(None, CommandBody::Out).unwrap(),
            ),
        ]);
    }

    #[test]
    fn test_kat_inverse_server_command() {
        kat_inverse_server_command(&[
            (
                b"VER 1 MSNP12\r\n".as_ref(),
                b"".as_ref(),
                ServerCommand::Ver {
                    trid: TrId(1),
                    dialects: vec!["MSNP12".into()],
                },
            ),
            (
                b"USR 3 TWN S lc=1033,id=507,tw=40\r\n",
                b"",
                ServerCommand::UsrTwnS {
                    trid: TrId(3),
                    policy: "lc=1033,id=507,tw=40".into(),
                },
            ),
            (
                b"USR 4 OK a@b.c 1 0\r\n",
                b"",
                ServerCommand::UsrOk {
                    trid: TrId(4),
                    login: email("a@b.c"),
                    args: vec!["1".into(), "0".into()],
                },
            ),
            (
                b"XFR 3 NS 64.4.61.38:1863 0 64.4.45.62:1863\r\n",
                b"",
                ServerCommand::XfrNs {
                    trid: TrId(3),
                    endpoint: Endpoint::new("64.4.61.38", 1863),
                    backup: Some(Endpoint::new("64.4.45.62", 1863)),
                },
            ),
            (
                b"XFR 9 SB 207.46.108.37:1863 CKI 17890981.1032659\r\n",
                b"",
                ServerCommand::XfrSb {
                    trid: TrId(9),
                    endpoint: Endpoint::new("207.46.108.37", 1863),
                    ticket: Token::try_from("17890981.1032659").unwrap(),
                },
            ),
            (
                b"CHL 0 15570131571988941333\r\n",
                b"",
                ServerCommand::Chl {
                    challenge: "15570131571988941333".into(),
                },
            ),
            (
                b"ILN 6 NLN a@b.c Nick%20A 268435456\r\n",
                b"",
                ServerCommand::Iln {
                    trid: TrId(6),
                    status: Status::Online,
                    login: email("a@b.c"),
                    nickname: "Nick A".into(),
                    capabilities: Capabilities(268435456),
                    object: None,
                },
            ),
            (
                b"NLN AWY a@b.c H%C3%A9llo 0 %3Cmsnobj%2F%3E\r\n",
                b"",
                ServerCommand::Nln {
                    status: Status::Away,
                    login: email("a@b.c"),
                    nickname: "Héllo".into(),
                    capabilities: Capabilities(0),
                    object: Some(MsnObject::try_from("%3Cmsnobj%2F%3E").unwrap()),
                },
            ),
            (
                b"FLN a@b.c\r\n",
                b"",
                ServerCommand::Fln { login: email("a@b.c") },
            ),
            (
                b"UBX a@b.c 24\r\n<Data><PSM></PSM></Data>",
                b"",
                ServerCommand::Ubx {
                    login: email("a@b.c"),
                    payload: b"<Data><PSM></PSM></Data>".to_vec(),
                },
            ),
            (
                b"SYN 5 0 0 14 3\r\n",
                b"",
                ServerCommand::Syn {
                    trid: TrId(5),
                    version1: "0".into(),
                    version2: "0".into(),
                    contact_count: 14,
                    group_count: 3,
                },
            ),
            (
                b"LSG My%20Friends f3e85f90-58c3-47e7-8e4d-d5d5d20c5e49\r\n",
                b"",
                ServerCommand::Lsg {
                    name: "My Friends".into(),
                    guid: guid("f3e85f90-58c3-47e7-8e4d-d5d5d20c5e49"),
                },
            ),
            (
                b"LST N=a@b.c F=Nick C=d57283f5-b92a-4e7e-88cb-d0327f534a50 13 \
                  f3e85f90-58c3-47e7-8e4d-d5d5d20c5e49\r\n",
                b"",
                ServerCommand::Lst(LstEntry {
                    email: email("a@b.c"),
                    nickname: Some("Nick".into()),
                    guid: Some(guid("d57283f5-b92a-4e7e-88cb-d0327f534a50")),
                    lists: ListSet::from_bits(13),
                    groups: vec![guid("f3e85f90-58c3-47e7-8e4d-d5d5d20c5e49")],
                }),
            ),
            (
                b"LST N=r@x.y 8\r\n",
                b"",
                ServerCommand::Lst(LstEntry {
                    email: email("r@x.y"),
                    nickname: None,
                    guid: None,
                    lists: ListSet::from_bits(8),
                    groups: vec![],
                }),
            ),
            (
                b"ADC 0 RL N=x@y.z F=Some%20One\r\n",
                b"",
                ServerCommand::Adc {
                    trid: TrId(0),
                    list: List::Reverse,
                    email: Some(email("x@y.z")),
                    nickname: Some("Some One".into()),
                    guid: None,
                    group: None,
                },
            ),
            (
                b"REG 11 d57283f5-b92a-4e7e-88cb-d0327f534a50 smama\r\n",
                b"",
                ServerCommand::Reg {
                    trid: TrId(11),
                    guid: guid("d57283f5-b92a-4e7e-88cb-d0327f534a50"),
                    name: "smama".into(),
                },
            ),
            (
                b"RNG 11752013 207.46.108.38:1863 CKI 849102291.520491113 \
                  example@passport.com Example%20Name\r\n",
                b"",
                ServerCommand::Rng {
                    session: SessionId::try_from("11752013").unwrap(),
                    endpoint: Endpoint::new("207.46.108.38", 1863),
                    ticket: Token::try_from("849102291.520491113").unwrap(),
                    login: email("example@passport.com"),
                    nickname: "Example Name".into(),
                },
            ),
            (
                b"CAL 2 RINGING 11752013\r\n",
                b"",
                ServerCommand::CalRinging {
                    trid: TrId(2),
                    session: SessionId::try_from("11752013").unwrap(),
                },
            ),
            (
                b"ANS 1 OK\r\n",
                b"",
                ServerCommand::AnsOk { trid: TrId(1) },
            ),
            (
                b"JOI r@x.y Remote%20User 268435456\r\n",
                b"",
                ServerCommand::Joi {
                    login: email("r@x.y"),
                    nickname: "Remote User".into(),
                    capabilities: Some(Capabilities(268435456)),
                },
            ),
            (
                b"IRO 1 1 2 r@x.y Remote\r\n",
                b"",
                ServerCommand::Iro {
                    trid: TrId(1),
                    index: 1,
                    total: 2,
                    login: email("r@x.y"),
                    nickname: "Remote".into(),
                    capabilities: None,
                },
            ),
            (
                b"BYE r@x.y 1\r\n",
                b"",
                ServerCommand::Bye {
                    login: email("r@x.y"),
                    idle: true,
                },
            ),
            (
                b"BYE r@x.y\r\n",
                b"",
                ServerCommand::Bye {
                    login: email("r@x.y"),
                    idle: false,
                },
            ),
            (
                b"ACK 16\r\n",
                b"",
                ServerCommand::Ack { trid: TrId(16) },
            ),
            (
                b"QNG 50\r\n???",
                b"???",
                ServerCommand::Qng { until_next: 50 },
            ),
            (
                b"OUT OTH\r\n",
                b"",
                ServerCommand::Out {
                    reason: Some(OutReason::OtherClient),
                },
            ),
            (
                b"911 4\r\n",
                b"",
                ServerCommand::Error {
                    trid: TrId(4),
                    code: ServerError::AuthenticationFailed,
                },
            ),
        ]);
    }

    #[test]
    fn test_kat_encode() {
        known_answer_test_encode((
            Command::new(
                Some(TrId(6)),
                CommandBody::Chg {
                    status: Status::Online,
                    capabilities: Capabilities(0),
                    object: None,
                },
            )
            .unwrap(),
            b"CHG 6 NLN 0\r\n",
        ));

        known_answer_test_encode((
            ServerCommand::Error {
                trid: TrId(3),
                code: ServerError::ServerBusy,
            },
            b"207 3\r\n",
        ));
    }
}
