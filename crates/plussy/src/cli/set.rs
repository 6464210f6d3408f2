//! `set` and `fill` subcommands — change LED colors.
//!
//! Only one set-LED command may be in flight, and a newer request replaces an
//! unsent one. `fill` therefore waits for the matrix reply after every write
//! so no LED is skipped.

use super::link::Link;
use super::{
    Color, Config, LED_KEYS, LedIndex, MatrixSnapshot, Options, Result, SetOutput, kv, kv_width,
    print_leds,
};

fn print_result(
    device: String,
    led: Option<LedIndex>,
    color: Color,
    leds: MatrixSnapshot,
    json: bool,
) -> Result<()> {
    if json {
        return super::print_json(&SetOutput {
            device,
            led,
            color,
            leds,
        });
    }

    let w = kv_width(&["Device:", "LED:", "Color:"], LED_KEYS);
    kv("Device:", &device, w);
    match led {
        Some(led) => kv("LED:", led, w),
        None => kv("LED:", "all", w),
    }
    kv("Color:", color, w);
    println!();
    print_leds(&leds, w);
    Ok(())
}

/// Send one set-LED command and wait for the reply that acknowledges it.
fn set_and_wait(link: &Link, led: LedIndex, color: Color) -> Result<MatrixSnapshot> {
    link.controller().set_led(led.get(), color)?;
    link.next_snapshot()
}

pub(super) fn cmd_set(config: &Config, led: LedIndex, color: Color, opts: &Options) -> Result<()> {
    let (link, _) = Link::open(config, opts.timeout)?;
    let leds = set_and_wait(&link, led, color)?;
    print_result(link.device(), Some(led), color, leds, opts.json)
}

pub(super) fn cmd_fill(config: &Config, color: Color, opts: &Options) -> Result<()> {
    let (link, mut leds) = Link::open(config, opts.timeout)?;
    for led in LedIndex::all() {
        log::debug!("LED {led} -> {color}");
        leds = set_and_wait(&link, led, color)?;
    }
    print_result(link.device(), None, color, leds, opts.json)
}
