use alloy::{
    hex,
    primitives::{FixedBytes, utils::format_units},
};
use anyhow::Context;
use colored::Colorize;
use deposit_sweeper::{decode, types};

pub(crate) fn render(payload: &str, selector: FixedBytes<4>, decimals: u8) -> anyhow::Result<()> {
    let input = hex::decode(payload.trim()).context("payload is not valid hex")?;

    println!("\n{}\n", format!("**** Payload, {} bytes", input.len()).bright_blue());

    match decode::transfer_call(&input, selector) {
        Ok(call) => {
            println!("{}", format!("  to:     {}", types::normalized(&call.to)).cyan());
            println!("{}", format!("  amount: {}", call.amount).cyan());
            if let Ok(units) = format_units(call.amount, decimals) {
                println!("{}", format!("          {units} ({decimals} decimals)").bright_cyan());
            }
        },
        Err(skip) => println!("{}", format!("  not a transfer: {skip}").yellow()),
    }

    println!();

    Ok(())
}
