use kiln_wasm_abi::{ContractCallMsg, OpaqueMsg, TransferMsg, WireMessage};

use super::Keeper;
use crate::address::Address;
use crate::coin::{Coin, coins_from_wire};
use crate::context::Context;
use crate::error::KeeperError;

/// A contract-emitted message with exactly one validated variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMessage {
    Transfer {
        from: Address,
        to: Address,
        amount: Vec<Coin>,
    },
    ContractCall {
        contract: Address,
        funds: Vec<Coin>,
        msg: Vec<u8>,
    },
    /// Reserved for native actions beyond transfers; always rejected on dispatch.
    Opaque { data: Vec<u8> },
}

impl DispatchMessage {
    /// Validate the wire shape: exactly one populated variant, parsable addresses and coins.
    pub fn from_wire(msg: &WireMessage) -> Result<Self, KeeperError> {
        let transfer = msg.transfer.as_ref().filter(|m| !m.is_empty());
        let contract = msg.contract.as_ref().filter(|m| !m.is_empty());
        let opaque = msg.opaque.as_ref().filter(|m| !m.is_empty());

        match (transfer, contract, opaque) {
            (Some(transfer), None, None) => Self::parse_transfer(transfer),
            (None, Some(call), None) => Self::parse_contract_call(call),
            (None, None, Some(OpaqueMsg { data })) => {
                Ok(DispatchMessage::Opaque { data: data.clone() })
            }
            (None, None, None) => Err(KeeperError::Internal(format!(
                "unknown message: {msg:?}"
            ))),
            _ => Err(KeeperError::Internal(
                "single message cannot contain multiple variants".into(),
            )),
        }
    }

    fn parse_transfer(msg: &TransferMsg) -> Result<Self, KeeperError> {
        Ok(DispatchMessage::Transfer {
            from: Address::parse(&msg.from_address)?,
            to: Address::parse(&msg.to_address)?,
            amount: coins_from_wire(&msg.amount)?,
        })
    }

    fn parse_contract_call(msg: &ContractCallMsg) -> Result<Self, KeeperError> {
        Ok(DispatchMessage::ContractCall {
            contract: Address::parse(&msg.contract_addr)?,
            funds: coins_from_wire(&msg.send)?,
            msg: msg.msg.clone(),
        })
    }
}

impl Keeper {
    /// Route `messages` in emission order on behalf of `contract`. The first failure stops the
    /// batch; effects of earlier messages stay applied.
    pub(crate) fn dispatch_messages(
        &self,
        ctx: &mut Context,
        contract: &Address,
        messages: Vec<WireMessage>,
    ) -> Result<(), KeeperError> {
        for (index, wire) in messages.iter().enumerate() {
            let result = DispatchMessage::from_wire(wire)
                .and_then(|msg| self.dispatch_message(ctx, contract, msg));
            if let Err(err) = result {
                log::warn!("message {index} from {contract} rejected: {err}");
                return Err(err);
            }
        }
        Ok(())
    }

    fn dispatch_message(
        &self,
        ctx: &mut Context,
        contract: &Address,
        msg: DispatchMessage,
    ) -> Result<(), KeeperError> {
        match msg {
            DispatchMessage::Transfer { from, to, amount } => {
                if from != *contract {
                    return Err(KeeperError::Unauthorized(format!(
                        "contract {contract} cannot send funds of {from}"
                    )));
                }
                log::debug!("dispatch transfer {from} -> {to}");
                self.bank.transfer(&from, &to, &amount)?;
                Ok(())
            }
            DispatchMessage::ContractCall {
                contract: target,
                funds,
                msg,
            } => {
                log::debug!("dispatch call {contract} -> {target}");
                self.execute(ctx, &target, contract, &funds, &msg)?;
                Ok(())
            }
            DispatchMessage::Opaque { .. } => Err(KeeperError::Internal(
                "dispatch opaque message not yet implemented".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::test_support::{StubVm, ctx, fixture};
    use kiln_wasm::VmResponse;
    use kiln_wasm_abi::{WireCoin, WireMessage};

    fn addr(label: &str) -> String {
        Address::from_label(label).to_string()
    }

    #[test]
    fn parses_single_variants() {
        let msg = WireMessage::transfer(addr("a"), addr("b"), vec![WireCoin::new("ukiln", "5")]);
        assert_eq!(
            DispatchMessage::from_wire(&msg).unwrap(),
            DispatchMessage::Transfer {
                from: Address::from_label("a"),
                to: Address::from_label("b"),
                amount: vec![Coin::new("ukiln", 5)],
            }
        );

        let call = WireMessage::contract_call(addr("c"), b"{}".to_vec(), vec![]);
        assert!(matches!(
            DispatchMessage::from_wire(&call).unwrap(),
            DispatchMessage::ContractCall { msg, .. } if msg == b"{}"
        ));
    }

    #[test]
    fn rejects_multiple_or_no_variants() {
        let mut both = WireMessage::transfer(addr("a"), addr("b"), vec![]);
        both.contract = WireMessage::contract_call(addr("c"), b"{}".to_vec(), vec![]).contract;
        assert!(matches!(
            DispatchMessage::from_wire(&both),
            Err(KeeperError::Internal(msg)) if msg.contains("multiple")
        ));

        let mut with_opaque = WireMessage::opaque(vec![1]);
        with_opaque.transfer = WireMessage::transfer(addr("a"), addr("b"), vec![]).transfer;
        assert!(matches!(
            DispatchMessage::from_wire(&with_opaque),
            Err(KeeperError::Internal(_))
        ));

        assert!(matches!(
            DispatchMessage::from_wire(&WireMessage::default()),
            Err(KeeperError::Internal(msg)) if msg.contains("unknown")
        ));
    }

    #[test]
    fn empty_variants_do_not_count_as_populated() {
        let mut msg = WireMessage::contract_call(addr("c"), b"{}".to_vec(), vec![]);
        msg.transfer = Some(TransferMsg::default());
        assert!(matches!(
            DispatchMessage::from_wire(&msg).unwrap(),
            DispatchMessage::ContractCall { .. }
        ));
    }

    #[test]
    fn malformed_fields_map_to_specific_errors() {
        let bad_addr = WireMessage::transfer("cosmos1xyz", addr("b"), vec![]);
        assert!(matches!(
            DispatchMessage::from_wire(&bad_addr),
            Err(KeeperError::InvalidAddress(a)) if a == "cosmos1xyz"
        ));

        let bad_coin =
            WireMessage::transfer(addr("a"), addr("b"), vec![WireCoin::new("ukiln", "-1")]);
        assert!(matches!(
            DispatchMessage::from_wire(&bad_coin),
            Err(KeeperError::InvalidCoins(_))
        ));

        let bad_target = WireMessage::contract_call("nope", b"{}".to_vec(), vec![]);
        assert!(matches!(
            DispatchMessage::from_wire(&bad_target),
            Err(KeeperError::InvalidAddress(_))
        ));
    }

    #[test]
    fn batch_stops_at_first_failure() {
        let fx = fixture(StubVm::default());
        let creator = Address::from_label("creator");
        let code_id = fx.keeper.store_code(&creator, b"\0asm").unwrap();
        let mut ctx = ctx(1_000_000);
        let contract = fx
            .keeper
            .instantiate(&mut ctx, &creator, code_id, b"{}", &[])
            .unwrap();
        fx.bank
            .credit(&contract, &[Coin::new("ukiln", 100)])
            .unwrap();

        let pay = |to: &str, amount: &str| {
            WireMessage::transfer(
                contract.to_string(),
                addr(to),
                vec![WireCoin::new("ukiln", amount)],
            )
        };
        let messages = vec![pay("first", "10"), WireMessage::opaque(vec![9]), pay("third", "10")];
        fx.vm.reply(move |_| {
            Ok(VmResponse {
                messages,
                ..VmResponse::default()
            })
        });

        let err = fx
            .keeper
            .execute(&mut ctx, &contract, &creator, &[], b"{}")
            .unwrap_err();
        assert!(matches!(err, KeeperError::Internal(msg) if msg.contains("opaque")));
        assert_eq!(fx.bank.balance(&Address::from_label("first"), "ukiln").unwrap(), 10);
        assert_eq!(fx.bank.balance(&Address::from_label("third"), "ukiln").unwrap(), 0);
    }

    #[test]
    fn foreign_transfer_is_unauthorized() {
        let fx = fixture(StubVm::default());
        let creator = Address::from_label("creator");
        let victim = Address::from_label("victim");
        fx.bank.credit(&victim, &[Coin::new("ukiln", 100)]).unwrap();
        let code_id = fx.keeper.store_code(&creator, b"\0asm").unwrap();
        let mut ctx = ctx(1_000_000);
        let contract = fx
            .keeper
            .instantiate(&mut ctx, &creator, code_id, b"{}", &[])
            .unwrap();

        let theft = WireMessage::transfer(
            victim.to_string(),
            creator.to_string(),
            vec![WireCoin::new("ukiln", "100")],
        );
        fx.vm.reply(move |_| {
            Ok(VmResponse {
                messages: vec![theft],
                ..VmResponse::default()
            })
        });
        let err = fx
            .keeper
            .execute(&mut ctx, &contract, &creator, &[], b"{}")
            .unwrap_err();
        assert!(matches!(err, KeeperError::Unauthorized(_)));
        assert_eq!(fx.bank.balance(&victim, "ukiln").unwrap(), 100);
        assert_eq!(fx.bank.balance(&creator, "ukiln").unwrap(), 0);
    }
}
