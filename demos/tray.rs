use std::{thread, time::Duration};

use libvesktop::blocking::Host;

const SIZE: i32 = 32;

/// A filled circle of `argb`, in the buffer layout `Host::set_icon` expects
fn dot_icon(argb: [u8; 4]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + (SIZE * SIZE * 4) as usize);
    buf.extend_from_slice(&SIZE.to_ne_bytes());
    buf.extend_from_slice(&SIZE.to_ne_bytes());
    let center = SIZE as f32 / 2.0;
    for y in 0..SIZE {
        for x in 0..SIZE {
            let (dx, dy) = (x as f32 + 0.5 - center, y as f32 + 0.5 - center);
            if dx * dx + dy * dy <= center * center {
                buf.extend_from_slice(&argb);
            } else {
                buf.extend_from_slice(&[0; 4]);
            }
        }
    }
    buf
}

fn main() {
    pretty_env_logger::init();

    let mut host = Host::new(libvesktop::Config::default().title("libvesktop demo"));

    let accent = host.accent_color();
    match accent {
        Some(color) => println!("accent color: #{color:06x}"),
        None => println!("accent color unavailable"),
    }
    let accent = accent.unwrap_or(0x5865f2).to_be_bytes();

    if !host.init_service() {
        eprintln!("failed to create the tray item");
        return;
    }

    let unread = [0i64, 1, 2, 3, 0];
    for (i, count) in unread.into_iter().cycle().enumerate() {
        let title = match count {
            0 => "libvesktop demo".to_string(),
            n => format!("({n}) libvesktop demo"),
        };
        host.set_title(&title);
        host.update_launcher_count(count);
        let icon = if i % 2 == 0 {
            dot_icon([0xff, accent[1], accent[2], accent[3]])
        } else {
            dot_icon([0xff, 0x80, 0x80, 0x80])
        };
        if !host.set_icon(&icon) {
            eprintln!("the tray is not shown, is a StatusNotifierWatcher running?");
        }
        thread::sleep(Duration::from_secs(2));
    }
}
