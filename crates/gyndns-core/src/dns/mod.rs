//! Query responder
//!
//! [`DnsResponder`] turns one request [`Message`] into one response
//! [`Message`]. It is stateless apart from the record store it reads.
//!
//! | question        | found                         | not found / store error |
//! |-----------------|-------------------------------|-------------------------|
//! | A               | one A answer, authoritative   | NXDOMAIN, authoritative |
//! | MX              | one MX answer, authoritative  | NXDOMAIN, authoritative |
//! | anything else   | NOERROR, empty, not authoritative                      |
//!
//! Only the first A or MX question of a message is answered. The UDP
//! listener lives in [`udp`].

pub mod udp;

use std::net::IpAddr;

use hickory_proto::op::{Header, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, MX};
use hickory_proto::rr::{DNSClass, RData, Record, RecordType};
use tracing::debug;

use crate::error::Error;
use crate::store::RecordStore;

/// TTL of every answer, in seconds
pub const TTL: u32 = 16;

/// Preference of the MX answer
pub const MX_PREFERENCE: u16 = 10;

/// Answers A and MX questions from the record store
#[derive(Debug, Clone)]
pub struct DnsResponder {
    store: RecordStore,
}

impl DnsResponder {
    /// Create a responder over a record store
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Build the response to `request`
    ///
    /// The response echoes the transaction id, opcode, recursion-desired
    /// flag and every question of the request.
    pub async fn respond(&self, request: &Message) -> Message {
        let mut response = Message::new();
        response.set_header(Header::response_from_request(request.header()));
        response.add_queries(request.queries().iter().cloned());

        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            debug!(op_code = ?request.op_code(), "not a standard query");
            response.set_response_code(ResponseCode::NotImp);
            return response;
        }

        if request.queries().is_empty() {
            debug!(id = request.id(), "query without a question");
            response.set_response_code(ResponseCode::FormErr);
            return response;
        }

        for query in request.queries() {
            match query.query_type() {
                RecordType::A | RecordType::MX => {
                    self.answer(query, &mut response).await;
                    return response;
                }
                other => {
                    debug!(name = %query.name(), query_type = %other, "Unsupported question type");
                }
            }
        }

        response.set_response_code(ResponseCode::NoError);
        response.set_authoritative(false);
        response
    }

    async fn answer(&self, query: &Query, response: &mut Message) {
        let name = query.name();
        let hostname = name.to_ascii();
        debug!(hostname = %hostname, query_type = %query.query_type(), "Searching for hostname");

        response.set_authoritative(true);

        let address = match self.store.get(&hostname).await {
            Ok(address) => address,
            Err(Error::NotFound(_)) => {
                debug!(hostname = %hostname, "hostname not found");
                response.set_response_code(ResponseCode::NXDomain);
                return;
            }
            Err(e) => {
                debug!(hostname = %hostname, error = %e, "lookup failed, answering NXDOMAIN");
                response.set_response_code(ResponseCode::NXDomain);
                return;
            }
        };

        response.set_response_code(ResponseCode::NoError);

        let rdata = match (query.query_type(), address) {
            (RecordType::A, IpAddr::V4(v4)) => RData::A(A(v4)),
            (RecordType::A, IpAddr::V6(_)) => {
                debug!(hostname = %hostname, address = %address, "no IPv4 address for hostname");
                return;
            }
            _ => RData::MX(MX::new(MX_PREFERENCE, name.to_lowercase())),
        };

        debug!(hostname = %hostname, answer = %rdata, "answering");
        let mut record = Record::from_rdata(name.clone(), TTL, rdata);
        record.set_dns_class(DNSClass::IN);
        response.add_answer(record);
    }
}
