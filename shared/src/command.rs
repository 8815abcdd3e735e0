//! Request/response catalogue of the OATH device application.

use core::fmt;

use crate::frame::{CmdLen, Endpoint};

/// Code the application answers with when it does not know a request.
pub const RSP_UNKNOWN_CMD: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppCommand {
    code: u8,
    name: &'static str,
    cmd_len: CmdLen,
}

impl AppCommand {
    pub const fn new(code: u8, name: &'static str, cmd_len: CmdLen) -> Self {
        Self {
            code,
            name,
            cmd_len,
        }
    }

    pub const fn code(&self) -> u8 {
        self.code
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn cmd_len(&self) -> CmdLen {
        self.cmd_len
    }

    pub const fn endpoint(&self) -> Endpoint {
        Endpoint::App
    }
}

impl fmt::Display for AppCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A request and the response the application sends back for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPair {
    pub request: AppCommand,
    pub response: AppCommand,
}

const fn pair(
    code: u8,
    request: &'static str,
    request_len: CmdLen,
    response: &'static str,
    response_len: CmdLen,
) -> CommandPair {
    CommandPair {
        request: AppCommand::new(code, request, request_len),
        response: AppCommand::new(code + 1, response, response_len),
    }
}

pub const GET_NAME_VERSION: CommandPair = pair(
    0x01,
    "GetNameVersion",
    CmdLen::Len1,
    "GetNameVersionResponse",
    CmdLen::Len32,
);
pub const LOAD_TOC: CommandPair = pair(
    0x03,
    "LoadToC",
    CmdLen::Len128,
    "LoadToCResponse",
    CmdLen::Len4,
);
pub const GET_LIST: CommandPair = pair(
    0x05,
    "GetList",
    CmdLen::Len1,
    "GetListResponse",
    CmdLen::Len128,
);
pub const GET_ENCRYPTED_TOC: CommandPair = pair(
    0x07,
    "GetEncryptedToC",
    CmdLen::Len1,
    "GetEncryptedToCResponse",
    CmdLen::Len128,
);
pub const PUT: CommandPair = pair(0x09, "Put", CmdLen::Len128, "PutResponse", CmdLen::Len4);
pub const PUT_GET_RECORD: CommandPair = pair(
    0x0b,
    "PutGetRecord",
    CmdLen::Len1,
    "PutGetRecordResponse",
    CmdLen::Len128,
);
pub const CALCULATE: CommandPair = pair(
    0x0d,
    "Calculate",
    CmdLen::Len128,
    "CalculateResponse",
    CmdLen::Len128,
);

pub const CATALOGUE: [CommandPair; 7] = [
    GET_NAME_VERSION,
    LOAD_TOC,
    GET_LIST,
    GET_ENCRYPTED_TOC,
    PUT,
    PUT_GET_RECORD,
    CALCULATE,
];

/// Looks up the request with the given code.
pub fn request_by_code(code: u8) -> Option<&'static CommandPair> {
    CATALOGUE.iter().find(|pair| pair.request.code() == code)
}
