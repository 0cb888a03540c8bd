//! Captured ping outputs.

use linkwatch_kernel::probe::CommandOutput;

pub const IPUTILS_REACHABLE: &str = "PING 192.168.144.25 (192.168.144.25) 56(84) bytes of data.
64 bytes from 192.168.144.25: icmp_seq=1 ttl=64 time=8.21 ms

--- 192.168.144.25 ping statistics ---
1 packets transmitted, 1 received, 0% packet loss, time 0ms
rtt min/avg/max/mdev = 8.210/8.210/8.210/0.000 ms
";

pub const IPUTILS_PARTIAL_LOSS: &str = "PING 10.14.11.1 (10.14.11.1) 56(84) bytes of data.
64 bytes from 10.14.11.1: icmp_seq=1 ttl=64 time=41.7 ms
64 bytes from 10.14.11.1: icmp_seq=3 ttl=64 time=44.1 ms

--- 10.14.11.1 ping statistics ---
3 packets transmitted, 2 received, 33.3333% packet loss, time 2003ms
rtt min/avg/max/mdev = 41.700/42.900/44.100/1.200 ms
";

pub const REPLIES_WITHOUT_SUMMARY: &str = "64 bytes from 10.0.0.7: icmp_seq=1 ttl=64 time=12.0 ms
64 bytes from 10.0.0.7: icmp_seq=2 ttl=64 time=18.0 ms
";

pub const WINDOWS_REACHABLE: &str = "Pinging 192.168.1.10 with 32 bytes of data:
Reply from 192.168.1.10: bytes=32 time=3ms TTL=64

Ping statistics for 192.168.1.10:
    Packets: Sent = 1, Received = 1, Lost = 0 (0% loss),
Approximate round trip times in milli-seconds:
    Minimum = 3ms, Maximum = 3ms, Average = 3ms
";

pub const UNPARSEABLE: &str = "pong\n";

/// A ping process that exited with `code` after printing `stdout`.
pub fn exited(code: i32, stdout: &str) -> CommandOutput {
    CommandOutput {
        success: code == 0,
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}
