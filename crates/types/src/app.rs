// Path: crates/types/src/app.rs
//! The application data model: accounts, transactions, receipts, blocks.
//!
//! These are plain wire types. Derived fields (transaction ids, recovered
//! senders) and verification logic live in `kiln-tx`; this crate only
//! defines the shapes and their canonical encoding.

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::CodecError;
use crate::ids::{Address, BlockId, ProgramId, ADDRESS_LEN, ID_LEN, SIGNATURE_LEN};

/// Discriminant byte of [`Transaction::Deploy`].
pub const TAG_DEPLOY: u8 = 0x00;
/// Discriminant byte of [`Transaction::Invoke`].
pub const TAG_INVOKE: u8 = 0x01;

/// Per-address nonce record. Created implicitly at nonce 0 on first use
/// and persisted only once the nonce advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub nonce: u64,
}

impl Encode for Account {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.put_raw(self.address.as_bytes());
        w.put_u64(self.nonce);
        Ok(())
    }
}

impl Decode for Account {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let address = Address(r.read_array::<ADDRESS_LEN>()?);
        let nonce = r.read_u64()?;
        Ok(Self { address, nonce })
    }
}

/// A scalar argument to an exported guest function. These four types are
/// the only ones the engine will pass across the sandbox boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarArg {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Encode for ScalarArg {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        match self {
            ScalarArg::I32(v) => {
                w.put_u8(0);
                w.put_i32(*v);
            }
            ScalarArg::I64(v) => {
                w.put_u8(1);
                w.put_i64(*v);
            }
            ScalarArg::F32(v) => {
                w.put_u8(2);
                w.put_f32(*v);
            }
            ScalarArg::F64(v) => {
                w.put_u8(3);
                w.put_f64(*v);
            }
        }
        Ok(())
    }
}

impl Decode for ScalarArg {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(ScalarArg::I32(r.read_i32()?)),
            1 => Ok(ScalarArg::I64(r.read_i64()?)),
            2 => Ok(ScalarArg::F32(r.read_f32()?)),
            3 => Ok(ScalarArg::F64(r.read_f64()?)),
            tag => Err(CodecError::UnknownTag {
                what: "scalar argument",
                tag,
            }),
        }
    }
}

/// Registers new guest bytecode. The deployed program's id is the id of
/// this transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployTx {
    pub contract_bytes: Vec<u8>,
    pub sender_nonce: u64,
    pub signature: [u8; SIGNATURE_LEN],
}

/// Calls an exported function of a previously deployed program.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeTx {
    pub program_id: ProgramId,
    pub function: String,
    pub scalar_args: Vec<ScalarArg>,
    pub byte_args: Vec<u8>,
    pub sender_nonce: u64,
    pub signature: [u8; SIGNATURE_LEN],
}

/// A signed transaction, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    Deploy(DeployTx),
    Invoke(InvokeTx),
}

impl Transaction {
    pub fn sender_nonce(&self) -> u64 {
        match self {
            Transaction::Deploy(tx) => tx.sender_nonce,
            Transaction::Invoke(tx) => tx.sender_nonce,
        }
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        match self {
            Transaction::Deploy(tx) => &tx.signature,
            Transaction::Invoke(tx) => &tx.signature,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Transaction::Deploy(_) => TAG_DEPLOY,
            Transaction::Invoke(_) => TAG_INVOKE,
        }
    }

    fn encode_body(&self, w: &mut Writer) -> Result<(), CodecError> {
        match self {
            Transaction::Deploy(tx) => {
                w.put_bytes(&tx.contract_bytes)?;
                w.put_u64(tx.sender_nonce);
            }
            Transaction::Invoke(tx) => {
                w.put_raw(tx.program_id.as_bytes());
                w.put_str(&tx.function)?;
                w.put_u32(tx.scalar_args.len() as u32);
                for arg in &tx.scalar_args {
                    arg.encode(w)?;
                }
                w.put_bytes(&tx.byte_args)?;
                w.put_u64(tx.sender_nonce);
            }
        }
        Ok(())
    }

    /// Canonical encoding of the unsigned body (tag plus every field except
    /// the signature). This is the message that gets signed; the tag byte
    /// separates the two kinds' signing domains.
    pub fn unsigned_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut w = Writer::new();
        w.put_u8(self.tag());
        self.encode_body(&mut w)?;
        Ok(w.into_bytes())
    }
}

impl Encode for Transaction {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.put_u8(self.tag());
        self.encode_body(w)?;
        w.put_raw(self.signature());
        Ok(())
    }
}

impl Decode for Transaction {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            TAG_DEPLOY => {
                let contract_bytes = r.read_bytes()?;
                let sender_nonce = r.read_u64()?;
                let signature = r.read_array::<SIGNATURE_LEN>()?;
                Ok(Transaction::Deploy(DeployTx {
                    contract_bytes,
                    sender_nonce,
                    signature,
                }))
            }
            TAG_INVOKE => {
                let program_id = ProgramId::from(r.read_array::<ID_LEN>()?);
                let function = r.read_string()?;
                let count = r.read_u32()?;
                let mut scalar_args = Vec::new();
                for _ in 0..count {
                    scalar_args.push(ScalarArg::decode(r)?);
                }
                let byte_args = r.read_bytes()?;
                let sender_nonce = r.read_u64()?;
                let signature = r.read_array::<SIGNATURE_LEN>()?;
                Ok(Transaction::Invoke(InvokeTx {
                    program_id,
                    function,
                    scalar_args,
                    byte_args,
                    sender_nonce,
                    signature,
                }))
            }
            tag => Err(CodecError::UnknownTag {
                what: "transaction",
                tag,
            }),
        }
    }
}

/// Persisted record of a processed transaction and its outcome.
/// `invocation_successful` is always true for deploys.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub tx: Transaction,
    pub invocation_successful: bool,
    pub return_value: Vec<u8>,
}

impl Encode for Receipt {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        self.tx.encode(w)?;
        w.put_bool(self.invocation_successful);
        w.put_bytes(&self.return_value)?;
        Ok(())
    }
}

impl Decode for Receipt {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let tx = Transaction::decode(r)?;
        let invocation_successful = r.read_bool()?;
        let return_value = r.read_bytes()?;
        Ok(Self {
            tx,
            invocation_successful,
            return_value,
        })
    }
}

/// A block of transactions. The id and byte representation are derived,
/// not serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub parent_id: BlockId,
    pub transactions: Vec<Transaction>,
}

impl Encode for Block {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.put_raw(self.parent_id.as_bytes());
        w.put_u32(self.transactions.len() as u32);
        for tx in &self.transactions {
            tx.encode(w)?;
        }
        Ok(())
    }
}

impl Decode for Block {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let parent_id = BlockId::from(r.read_array::<ID_LEN>()?);
        let count = r.read_u32()?;
        let mut transactions = Vec::new();
        for _ in 0..count {
            transactions.push(Transaction::decode(r)?);
        }
        Ok(Self {
            parent_id,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Id;
    use proptest::prelude::*;

    fn sample_deploy() -> Transaction {
        Transaction::Deploy(DeployTx {
            contract_bytes: vec![0x00, 0x61, 0x73, 0x6d, 1, 0, 0, 0],
            sender_nonce: 1,
            signature: [7u8; SIGNATURE_LEN],
        })
    }

    fn sample_invoke() -> Transaction {
        Transaction::Invoke(InvokeTx {
            program_id: Id([9u8; ID_LEN]),
            function: "run".to_string(),
            scalar_args: vec![
                ScalarArg::I32(-1),
                ScalarArg::I64(1 << 40),
                ScalarArg::F32(0.5),
                ScalarArg::F64(-2.25),
            ],
            byte_args: b"{\"k\":1}".to_vec(),
            sender_nonce: 2,
            signature: [3u8; SIGNATURE_LEN],
        })
    }

    #[test]
    fn transaction_round_trip() {
        for tx in [sample_deploy(), sample_invoke()] {
            let bytes = tx.to_bytes().unwrap();
            assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);
        }
    }

    #[test]
    fn unsigned_bytes_exclude_signature() {
        let tx = sample_invoke();
        let unsigned = tx.unsigned_bytes().unwrap();
        let signed = tx.to_bytes().unwrap();
        assert_eq!(signed.len(), unsigned.len() + SIGNATURE_LEN);
        assert_eq!(&signed[..unsigned.len()], &unsigned[..]);
    }

    #[test]
    fn unknown_transaction_tag_rejected() {
        let mut bytes = sample_deploy().to_bytes().unwrap();
        bytes[0] = 0x7f;
        assert!(matches!(
            Transaction::from_bytes(&bytes),
            Err(CodecError::UnknownTag {
                what: "transaction",
                tag: 0x7f
            })
        ));
    }

    #[test]
    fn receipt_round_trip() {
        let receipt = Receipt {
            tx: sample_invoke(),
            invocation_successful: false,
            return_value: vec![1, 2, 3],
        };
        let bytes = receipt.to_bytes().unwrap();
        assert_eq!(Receipt::from_bytes(&bytes).unwrap(), receipt);
    }

    #[test]
    fn block_round_trip() {
        let block = Block {
            parent_id: Id([0xaa; ID_LEN]),
            transactions: vec![sample_deploy(), sample_invoke()],
        };
        let bytes = block.to_bytes().unwrap();
        assert_eq!(Block::from_bytes(&bytes).unwrap(), block);
    }

    #[test]
    fn account_round_trip() {
        let account = Account {
            address: Address([5u8; ADDRESS_LEN]),
            nonce: 42,
        };
        let bytes = account.to_bytes().unwrap();
        assert_eq!(Account::from_bytes(&bytes).unwrap(), account);
    }

    fn arb_scalar() -> impl Strategy<Value = ScalarArg> {
        prop_oneof![
            any::<i32>().prop_map(ScalarArg::I32),
            any::<i64>().prop_map(ScalarArg::I64),
            // Bit-pattern floats keep NaN payloads out of equality checks.
            any::<i32>().prop_map(|v| ScalarArg::F32(v as f32)),
            any::<i64>().prop_map(|v| ScalarArg::F64(v as f64)),
        ]
    }

    fn arb_transaction() -> impl Strategy<Value = Transaction> {
        let deploy = (proptest::collection::vec(any::<u8>(), 1..512), 1..u64::MAX)
            .prop_map(|(contract_bytes, sender_nonce)| {
                Transaction::Deploy(DeployTx {
                    contract_bytes,
                    sender_nonce,
                    signature: [1u8; SIGNATURE_LEN],
                })
            });
        let invoke = (
            any::<[u8; ID_LEN]>(),
            "[a-z_]{1,24}",
            proptest::collection::vec(arb_scalar(), 0..16),
            proptest::collection::vec(any::<u8>(), 0..512),
            1..u64::MAX,
        )
            .prop_map(|(id, function, scalar_args, byte_args, sender_nonce)| {
                Transaction::Invoke(InvokeTx {
                    program_id: Id(id),
                    function,
                    scalar_args,
                    byte_args,
                    sender_nonce,
                    signature: [2u8; SIGNATURE_LEN],
                })
            });
        prop_oneof![deploy, invoke]
    }

    proptest! {
        #[test]
        fn prop_transaction_round_trip(tx in arb_transaction()) {
            let bytes = tx.to_bytes().unwrap();
            prop_assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);
        }

        #[test]
        fn prop_block_round_trip(
            parent in any::<[u8; ID_LEN]>(),
            txs in proptest::collection::vec(arb_transaction(), 1..8),
        ) {
            let block = Block { parent_id: Id(parent), transactions: txs };
            let bytes = block.to_bytes().unwrap();
            prop_assert_eq!(Block::from_bytes(&bytes).unwrap(), block);
        }
    }
}
