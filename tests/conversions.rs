use bq25703a_rs::power::PowerBudget;
use bq25703a_rs::registers::{
    ADC_IIN, ADC_VBAT, ADC_VBUS, MIN_SYSTEM_VOLTAGE_FLOOR, MaxChargeVoltage, charge_current_bytes,
    charge_current_setting, charge_voltage_setting, max_charge_voltage_mv, min_system_voltage_mv, setting_to_ma,
};

#[test]
fn voltage_table_tracks_cell_count() {
    for cells in 1..=4u32 {
        let setting = charge_voltage_setting(cells as u8);
        let max = max_charge_voltage_mv(setting.max_charge);
        let min = min_system_voltage_mv(setting.min_system);
        assert!(max.abs_diff(cells * 4_200) <= 16, "{} cells: max {}", cells, max);
        assert!(min.abs_diff(cells * 2_800) <= 256, "{} cells: min {}", cells, min);
        assert!(min < max);
    }
}

#[test]
fn unsupported_cell_counts_disable_charging() {
    for cells in [0u8, 5, 8, 255] {
        let setting = charge_voltage_setting(cells);
        assert_eq!(setting.max_charge, MaxChargeVoltage::empty());
        assert_eq!(setting.min_system, MIN_SYSTEM_VOLTAGE_FLOOR);
        assert_eq!(min_system_voltage_mv(setting.min_system), 1_024);
    }
}

#[test]
fn current_setting_is_monotonic_and_bounded() {
    let mut previous = 0;
    for ma in (0..=10_000).step_by(37) {
        let setting = charge_current_setting(ma);
        assert!(setting >= previous);
        assert!(setting <= 128);
        assert!(setting_to_ma(setting) <= ma.min(6_000));
        previous = setting;
    }
}

#[test]
fn current_setting_clamps_to_ceiling() {
    assert_eq!(charge_current_setting(0), 0);
    assert_eq!(charge_current_setting(63), 0);
    assert_eq!(charge_current_setting(64), 1);
    assert_eq!(charge_current_setting(6_000), charge_current_setting(50_000));
    assert_eq!(charge_current_setting(u32::MAX), 93);
}

#[test]
fn current_setting_round_trips_through_milliamps() {
    for setting in 0..=93u8 {
        assert_eq!(charge_current_setting(setting_to_ma(setting)), setting);
    }
}

#[test]
fn current_bytes_place_setting_at_bit_six() {
    assert_eq!(charge_current_bytes(0), [0x00, 0x00]);
    assert_eq!(charge_current_bytes(46), [0x80, 0x0B]);
    assert_eq!(charge_current_bytes(128), [0x00, 0x20]);
    for setting in 0..=128u8 {
        let word = u16::from_le_bytes(charge_current_bytes(setting));
        assert_eq!(u32::from(word), setting_to_ma(setting));
    }
}

#[test]
fn adc_channels_apply_fixed_calibration() {
    assert_eq!(ADC_VBAT.convert(0), 2_880);
    assert_eq!(ADC_VBAT.convert(255), 255 * 64 + 2_880);
    assert_eq!(ADC_VBUS.convert(0), 3_200);
    assert_eq!(ADC_IIN.convert(100), 5_000);
}

#[test]
fn charge_power_stays_within_ceiling() {
    let budget = PowerBudget::default();
    for bus_mv in [0u32, 5_000, 20_000, 48_000] {
        for temp in [-20.0f32, 25.0, 45.0, 60.0, 90.0, f32::NAN] {
            let p = budget.max_charge_power_mw(bus_mv, 5_000, 240_000, temp);
            assert!(p <= budget.max_charging_power_mw);
        }
    }
}

#[test]
fn derating_is_monotonic_above_threshold() {
    let budget = PowerBudget::default();
    let mut previous = 1.0f32;
    for t in 40..=90 {
        let scalar = budget.power_scalar(t as f32);
        assert!((0.0..=1.0).contains(&scalar));
        assert!(scalar <= previous);
        previous = scalar;
    }
    assert_eq!(budget.power_scalar(f32::NAN), 0.0);
}

#[test]
fn low_battery_voltage_yields_no_current() {
    let budget = PowerBudget::default();
    assert_eq!(budget.charge_current_ma(60_000, 0), 0);
    assert_eq!(budget.charge_current_ma(60_000, 2_499), 0);
    assert!(budget.charge_current_ma(60_000, 2_500) > 0);
}
