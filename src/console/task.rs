// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{Pipes, UsbDriver, MAX_PACKET_SIZE};
use embassy_futures::join::join;
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender};
use embassy_usb::driver::EndpointError;
use embassy_usb::UsbDevice;

struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        if let EndpointError::BufferOverflow = val {
            defmt::error!("USB packet larger than buffer");
        }
        Disconnected {}
    }
}

async fn receive(
    receiver: &mut Receiver<'static, UsbDriver>,
    pipes: &Pipes,
) -> Result<(), Disconnected> {
    let mut buf = [0; MAX_PACKET_SIZE as usize];
    loop {
        let n = receiver.read_packet(&mut buf).await?;
        pipes.rx.write_all(&buf[..n]).await;
    }
}

async fn transmit(
    sender: &mut Sender<'static, UsbDriver>,
    pipes: &Pipes,
) -> Result<(), Disconnected> {
    // Always a short packet, so a transfer never needs a trailing zero-length packet
    let mut buf = [0; MAX_PACKET_SIZE as usize - 1];
    loop {
        let n = pipes.tx.read(&mut buf).await;
        sender.write_packet(&buf[..n]).await?;
    }
}

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) {
    defmt::info!("Starting usb task");
    device.run().await;
}

#[embassy_executor::task]
pub async fn bridge_task(class: CdcAcmClass<'static, UsbDriver>, pipes: &'static Pipes) {
    let (mut sender, mut receiver) = class.split();
    let rx = async {
        loop {
            defmt::debug!("Waiting for USB");
            receiver.wait_connection().await;
            defmt::debug!("USB connected");
            let _ = receive(&mut receiver, pipes).await;
            defmt::debug!("USB disconnected");
        }
    };
    let tx = async {
        loop {
            sender.wait_connection().await;
            let _ = transmit(&mut sender, pipes).await;
        }
    };
    join(rx, tx).await;
}
