use std::env;

fn main() {
    // 告诉 cargo 在 build.rs 变化时重新运行
    println!("cargo:rerun-if-changed=build.rs");

    // 主机上的单元测试不需要任何链接配置
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    if target_arch != "xtensa" {
        return;
    }

    // esp-hal 1.0 的链接脚本，只作用于固件二进制
    println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
}
